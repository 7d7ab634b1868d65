use super::*;

impl HttpRemote {
    pub(super) async fn list_scenes_impl(&self) -> Result<Vec<RemoteScene>> {
        with_retries("list scenes", || async {
            let resp = self
                .authed(self.client.get(self.url("/scenes/")))
                .send()
                .await
                .context("list scenes request")?;
            let scenes: Vec<RemoteScene> = self
                .ensure_ok(resp, "list scenes")?
                .json()
                .await
                .context("parse scene list")?;
            Ok(scenes)
        })
        .await
    }

    pub(super) async fn create_scene_impl(&self, title: &str, data: &Value) -> Result<RemoteScene> {
        let resp = self
            .authed(self.client.post(self.url("/scenes/")))
            .json(&CreateSceneRequest { title, data })
            .send()
            .await
            .context("create scene request")?;
        let scene: RemoteScene = self
            .ensure_ok(resp, "create scene")?
            .json()
            .await
            .context("parse created scene")?;
        Ok(scene)
    }

    pub(super) async fn get_scene_impl(&self, id: &SceneId) -> Result<RemoteScene> {
        with_retries("get scene", || async {
            let resp = self
                .authed(self.client.get(self.url(&format!("/scenes/{}/", id))))
                .send()
                .await
                .context("get scene request")?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                anyhow::bail!("scene {} not found", id);
            }
            let scene: RemoteScene = self
                .ensure_ok(resp, "get scene")?
                .json()
                .await
                .context("parse scene")?;
            Ok(scene)
        })
        .await
    }

    pub(super) async fn update_scene_impl(
        &self,
        id: &SceneId,
        patch: &ScenePatch,
    ) -> Result<RemoteScene> {
        let resp = self
            .authed(self.client.patch(self.url(&format!("/scenes/{}/", id))))
            .json(patch)
            .send()
            .await
            .context("update scene request")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            anyhow::bail!("scene {} not found", id);
        }
        let scene: RemoteScene = self
            .ensure_ok(resp, "update scene")?
            .json()
            .await
            .context("parse updated scene")?;
        Ok(scene)
    }

    pub(super) async fn delete_scene_impl(&self, id: &SceneId) -> Result<()> {
        let resp = self
            .authed(self.client.delete(self.url(&format!("/scenes/{}/", id))))
            .send()
            .await
            .context("delete scene request")?;
        // Already gone is as good as deleted.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.ensure_ok(resp, "delete scene")?;
        Ok(())
    }
}
