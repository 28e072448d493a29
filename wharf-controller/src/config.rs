//! Controller configuration
//!
//! Defines all configurable parameters for the controller: listen address,
//! project layout, image naming, timeouts and the three shared secrets.
//! Values come from command-line flags with environment variable fallbacks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use secrecy::{ExposeSecret, SecretString};

use crate::manifest::{DEV_MANIFEST_FILE, MANIFEST_FILE};

/// Command-line arguments
#[derive(Parser)]
#[command(name = "wharf-controller")]
#[command(about = "Webhook-triggered continuous deployment controller", long_about = None)]
pub struct Args {
    /// Development mode: read docker-compose.dev.yml manifests
    #[arg(short, long, env = "WHARF_DEVELOPMENT")]
    pub development: bool,

    /// Port to listen on
    #[arg(short, long, env = "WHARF_PORT", default_value_t = 8443)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "WHARF_BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Directory holding one checkout per deployable project
    #[arg(long, env = "WHARF_APPS_DIR", default_value = "apps")]
    pub apps_dir: PathBuf,

    /// Registry namespace the worker pushes images to
    #[arg(
        long,
        env = "WHARF_IMAGE_NAMESPACE",
        default_value = "docker.io/therileyjohnson"
    )]
    pub image_namespace: String,

    /// Seconds a single image pull may take
    #[arg(long, env = "WHARF_PULL_TIMEOUT_SECS", default_value_t = 60)]
    pub pull_timeout_secs: u64,

    /// Seconds between worker liveness pings (0 disables pings)
    #[arg(long, env = "WHARF_PING_INTERVAL_SECS", default_value_t = 30)]
    pub ping_interval_secs: u64,

    /// Largest frame accepted from the worker, in bytes
    #[arg(long, env = "WHARF_WORKER_MAX_MESSAGE_SIZE", default_value_t = 10240)]
    pub worker_max_message_size: usize,

    /// Secret the source host signs webhooks with
    #[arg(long, env = "GITHUB_SECRET", hide_env_values = true)]
    pub github_secret: String,

    /// Key a worker presents when attaching
    #[arg(long, env = "WORKER_SECRET", hide_env_values = true)]
    pub worker_secret: String,

    /// Key a router presents when attaching
    #[arg(long, env = "ROUTER_SECRET", hide_env_values = true)]
    pub router_secret: String,
}

/// The three shared secrets
///
/// Held as [`SecretString`] so they never show up in logs or debug output.
#[derive(Debug)]
pub struct Secrets {
    pub github: SecretString,
    pub worker: SecretString,
    pub router: SecretString,
}

impl Secrets {
    /// Wraps the raw secrets, stripping trailing line endings
    pub fn new(github: &str, worker: &str, router: &str) -> Self {
        Self {
            github: wrap_secret(github),
            worker: wrap_secret(worker),
            router: wrap_secret(router),
        }
    }
}

fn wrap_secret(raw: &str) -> SecretString {
    SecretString::from(raw.trim_end_matches(['\r', '\n']).to_string())
}

/// Controller configuration
#[derive(Debug)]
pub struct Config {
    /// Use development manifests
    pub development: bool,

    /// Socket address to bind (e.g., "0.0.0.0:8443")
    pub bind_addr: String,

    /// Directory holding one checkout per deployable project
    pub apps_dir: PathBuf,

    /// Registry namespace images are pulled from
    pub image_namespace: String,

    /// Maximum time a single image pull may take
    pub pull_timeout: Duration,

    /// How often to ping an attached worker (`None` disables pings)
    pub ping_interval: Option<Duration>,

    /// Largest frame accepted from the worker
    pub worker_max_message_size: usize,

    pub secrets: Secrets,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(secrets: Secrets) -> Self {
        Self {
            development: false,
            bind_addr: "0.0.0.0:8443".to_string(),
            apps_dir: PathBuf::from("apps"),
            image_namespace: "docker.io/therileyjohnson".to_string(),
            pull_timeout: Duration::from_secs(60),
            ping_interval: Some(Duration::from_secs(30)),
            worker_max_message_size: 10240,
            secrets,
        }
    }

    /// Builds and validates the configuration from parsed arguments
    pub fn from_args(args: Args) -> anyhow::Result<Self> {
        let secrets = Secrets::new(&args.github_secret, &args.worker_secret, &args.router_secret);

        let mut config = Self::new(secrets);
        config.development = args.development;
        config.bind_addr = format!("{}:{}", args.bind_addr, args.port);
        config.apps_dir = args.apps_dir;
        config.image_namespace = args.image_namespace;
        config.pull_timeout = Duration::from_secs(args.pull_timeout_secs);
        config.ping_interval =
            (args.ping_interval_secs > 0).then(|| Duration::from_secs(args.ping_interval_secs));
        config.worker_max_message_size = args.worker_max_message_size;

        config.validate()?;
        Ok(config)
    }

    /// Name of the compose manifest each project directory holds
    pub fn manifest_file(&self) -> &'static str {
        if self.development {
            DEV_MANIFEST_FILE
        } else {
            MANIFEST_FILE
        }
    }

    /// Resolves the apps directory against `cwd`
    pub fn resolve_apps_dir(&self, cwd: &Path) -> PathBuf {
        if self.apps_dir.is_absolute() {
            self.apps_dir.clone()
        } else {
            cwd.join(&self.apps_dir)
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, secret) in [
            ("GITHUB_SECRET", &self.secrets.github),
            ("WORKER_SECRET", &self.secrets.worker),
            ("ROUTER_SECRET", &self.secrets.router),
        ] {
            if secret.expose_secret().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }

        if self.image_namespace.trim().is_empty() {
            anyhow::bail!("image_namespace cannot be empty");
        }

        if self.pull_timeout.is_zero() {
            anyhow::bail!("pull_timeout must be greater than 0");
        }

        if self.worker_max_message_size == 0 {
            anyhow::bail!("worker_max_message_size must be greater than 0");
        }

        Ok(())
    }
}
