use recode::commands::{render_config, resolve_job_spec, BatchArgs};
use recode::{init_tracing, load_config};
use recode_core::config::ServiceConfig;
use tempfile::tempdir;

#[test]
fn init_tracing_tolerates_repeat_calls_and_bad_filters() {
    init_tracing("info");
    init_tracing("not a [valid filter");
}

#[test]
fn load_config_reads_yaml_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("recode.yaml");
    std::fs::write(&path, "ghidra:\n  project_name: FromFile\n").unwrap();
    let config = load_config(Some(&path)).expect("load");
    assert_eq!(config.ghidra.project_name, "FromFile");
}

#[test]
fn render_config_supports_yaml_and_json() {
    let config = ServiceConfig::default();
    let yaml = render_config(&config, false).unwrap();
    assert_eq!(ServiceConfig::from_yaml_str(&yaml).unwrap(), config);
    let json = render_config(&config, true).unwrap();
    let parsed: ServiceConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn job_spec_prefers_flags_over_config() {
    let mut config = ServiceConfig::default();
    config.blob.blob_name = Some("from-env.exe".into());
    config.blob.output_container = Some("env-out".into());

    let spec = resolve_job_spec(&config, &BatchArgs::default()).unwrap();
    assert_eq!(spec.blob_name, "from-env.exe");
    assert_eq!(spec.output_container, "env-out");
    assert_eq!(spec.source_container, "binaries");

    let args = BatchArgs {
        blob: Some("flag.exe".into()),
        source_container: Some("uploads".into()),
        output_container: Some("flag-out".into()),
        create_container: false,
    };
    let spec = resolve_job_spec(&config, &args).unwrap();
    assert_eq!(spec.blob_name, "flag.exe");
    assert_eq!(spec.source_container, "uploads");
    assert_eq!(spec.output_container, "flag-out");
}

#[test]
fn job_spec_names_missing_setting() {
    let err = resolve_job_spec(&ServiceConfig::default(), &BatchArgs::default()).unwrap_err();
    assert!(err.to_string().contains("BLOB_NAME"), "{err}");
}
