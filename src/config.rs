//! Campaign configuration.
//!
//! One explicitly constructed config, built at process start and passed by
//! reference (or inside the server state) to everything that needs it. No
//! lazily populated globals.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration for the whole campaign process.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// Address the HTTP server listens on.
    pub listen_addr: SocketAddr,

    /// Root under which per-wave artifact trees live.
    pub data_dir: PathBuf,

    /// Where the ledger snapshot is persisted.
    pub snapshot_path: PathBuf,

    /// Base URL of the external templating endpoint that renders message
    /// bodies, e.g. `http://localhost:8000`.
    pub message_url_root: String,

    /// Host of the external analytics site redirect hits land on.
    pub analytics_host: String,

    /// Campaign tag: `utm_source` on redirects, the tag on outbound mail,
    /// and the filter when scanning the mail event log.
    pub campaign: String,

    /// Command invoked to rasterize a URL into a document file.
    pub print_command: String,

    /// From address for outbound email.
    pub mail_from: String,

    /// Reply address advertised on outbound faxes.
    pub fax_from: String,

    /// Controlled inbox that receives email when not in production.
    pub test_inbox: String,

    /// Whether live sends go to real recipients. Off by default: outside
    /// production everything is diverted to `test_inbox`.
    pub production: bool,
}

impl CampaignConfig {
    /// Builds a config from environment variables, with development
    /// defaults for everything unset.
    pub fn from_env() -> Self {
        CampaignConfig {
            listen_addr: env_or("OUTREACH_LISTEN", "0.0.0.0:3000")
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000))),
            data_dir: PathBuf::from(env_or("OUTREACH_DATA_DIR", "data")),
            snapshot_path: PathBuf::from(env_or("OUTREACH_SNAPSHOT", "data/ledger.json")),
            message_url_root: env_or("OUTREACH_MESSAGE_URL_ROOT", "http://localhost:8000"),
            analytics_host: env_or("OUTREACH_ANALYTICS_HOST", "https://openprescribing.net"),
            campaign: env_or("OUTREACH_CAMPAIGN", "outreach"),
            print_command: env_or("OUTREACH_PRINT_CMD", "node scripts/print.js"),
            mail_from: env_or("OUTREACH_MAIL_FROM", "outreach@example.org"),
            fax_from: env_or("OUTREACH_FAX_FROM", "outreach@example.org"),
            test_inbox: env_or("OUTREACH_TEST_INBOX", "outreach-test@example.org"),
            production: std::env::var("OUTREACH_PRODUCTION").as_deref() == Ok("1"),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_snapshot_path(mut self, snapshot_path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = snapshot_path.into();
        self
    }

    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = campaign.into();
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// The URL on the templating endpoint that renders a message body.
    pub fn message_url(&self, id: crate::types::InterventionId) -> String {
        format!("{}/msg/{}", self.message_url_root, id)
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        CampaignConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_dir: PathBuf::from("data"),
            snapshot_path: PathBuf::from("data/ledger.json"),
            message_url_root: "http://localhost:8000".to_string(),
            analytics_host: "https://openprescribing.net".to_string(),
            campaign: "outreach".to_string(),
            print_command: "node scripts/print.js".to_string(),
            mail_from: "outreach@example.org".to_string(),
            fax_from: "outreach@example.org".to_string(),
            test_inbox: "outreach-test@example.org".to_string(),
            production: false,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
