use kana_state_upgrade::{cli, config, telemetry};

fn main() {
    let cli = cli::parse_from(std::env::args_os());

    let (cfg, config_error) = config::load_or_default();
    let telemetry_guard = telemetry::init(telemetry::TelemetryConfig::new(
        cli.verbose,
        cfg.logging.clone(),
    ));
    if let Some(err) = config_error {
        tracing::warn!("config load failed, using defaults: {err}");
    }

    let json = cli.json;
    if let Err(e) = cli::run(cli, &cfg) {
        tracing::error!(kind = e.kind(), effect = e.effect().as_str(), "error: {e}");
        if json {
            let _ = cli::print_json(&cli::error_json(&e));
        }
        drop(telemetry_guard);
        std::process::exit(1);
    }
}
