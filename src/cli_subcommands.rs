use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum RemoteCommands {
    /// Show the configured remote
    Show {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the configured remote
    Set {
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: Option<String>,
    },

    /// Forget the configured remote
    Clear,
}
