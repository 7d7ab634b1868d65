use super::*;

fn job_path(kind: JobKind) -> &'static str {
    match kind {
        JobKind::ImageEdit => "image-edit-jobs",
        JobKind::Video => "video-jobs",
    }
}

impl HttpRemote {
    pub(super) async fn submit_image_edit_impl(
        &self,
        scene: &SceneId,
        req: &ImageEditRequest,
    ) -> Result<JobTicket> {
        let image = reqwest::multipart::Part::bytes(req.image.clone())
            .file_name(req.file_name.clone())
            .mime_str(&req.mime_type)
            .context("image mime type")?;
        let mut form = reqwest::multipart::Form::new()
            .part("image", image)
            .text("n", req.normalized_count().to_string());
        if req.cutout {
            form = form.text("cutout", "true");
        }
        if let Some(prompt) = req.prompt.as_deref() {
            form = form.text("prompt", prompt.to_string());
        }
        if let Some(size) = req.size.as_deref() {
            form = form.text("size", size.to_string());
        }

        let resp = self
            .authed(
                self.client
                    .post(self.url(&format!("/scenes/{}/image-edit/", scene))),
            )
            .multipart(form)
            .send()
            .await
            .context("image edit request")?;
        let ticket: JobTicket = self
            .ensure_ok(resp, "image edit")?
            .json()
            .await
            .context("parse image edit ticket")?;
        Ok(ticket)
    }

    pub(super) async fn submit_video_impl(
        &self,
        scene: &SceneId,
        req: &VideoRequest,
    ) -> Result<JobTicket> {
        let resp = self
            .authed(self.client.post(self.url(&format!("/scenes/{}/video/", scene))))
            .json(req)
            .send()
            .await
            .context("video request")?;
        let ticket: JobTicket = self
            .ensure_ok(resp, "video")?
            .json()
            .await
            .context("parse video ticket")?;
        Ok(ticket)
    }

    pub(super) async fn job_status_impl(&self, kind: JobKind, job: &JobId) -> Result<JobSnapshot> {
        with_retries("job status", || async {
            let resp = self
                .authed(
                    self.client
                        .get(self.url(&format!("/{}/{}/", job_path(kind), job))),
                )
                .send()
                .await
                .context("job status request")?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                anyhow::bail!("job {} not found", job);
            }
            let wire: JobDetailWire = self
                .ensure_ok(resp, "job status")?
                .json()
                .await
                .context("parse job status")?;
            Ok(JobSnapshot::from(wire))
        })
        .await
    }

    pub(super) async fn job_history_impl(
        &self,
        kind: JobKind,
        scene: &SceneId,
    ) -> Result<Vec<JobSummary>> {
        with_retries("job history", || async {
            let resp = self
                .authed(
                    self.client
                        .get(self.url(&format!("/scenes/{}/{}/", scene, job_path(kind)))),
                )
                .query(&[("limit", "50")])
                .send()
                .await
                .context("job history request")?;
            let jobs: Vec<JobSummary> = self
                .ensure_ok(resp, "job history")?
                .json()
                .await
                .context("parse job history")?;
            Ok(jobs)
        })
        .await
    }
}
