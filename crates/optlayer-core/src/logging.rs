use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a tracing subscriber for host applications and tools.
///
/// Log levels come from `RUST_LOG`, falling back to `info`. Fails if a
/// global subscriber is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .compact();

    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OptionBuilder, OptionManager};

    #[test]
    fn init_then_log_resolution() {
        // Only one subscriber per process; a second init just errors
        let _ = init();

        let manager = OptionManager::new();
        OptionBuilder::new("log", "value", 1)
            .register(&manager)
            .unwrap();
        manager.log_effective_values();
        assert!(init().is_err());
    }
}
