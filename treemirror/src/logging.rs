use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info";
const QUIET_TARGETS: [&str; 4] = ["hyper=warn", "reqwest=warn", "sqlx=warn", "rustls=warn"];

/// Builds the filter from `TREEMIRROR_LOG`, then `RUST_LOG`, then `info`.
pub fn env_filter(primary: Option<&str>, fallback: Option<&str>) -> EnvFilter {
    let spec = primary
        .or(fallback)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    let mut filter = EnvFilter::try_new(spec).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    for target in QUIET_TARGETS {
        if let Ok(directive) = target.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Installs the global subscriber writing to stderr. Later calls are no-ops.
pub fn init() {
    let primary = std::env::var("TREEMIRROR_LOG").ok();
    let fallback = std::env::var("RUST_LOG").ok();
    let filter = env_filter(primary.as_deref(), fallback.as_deref());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
