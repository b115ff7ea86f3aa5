use toml::Value;

use mx_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_config() -> Config {
	parse(SAMPLE_CONFIG_TEMPLATE_TOML.to_string())
}

fn parse(raw: String) -> Config {
	toml::from_str(&raw).expect("Failed to parse template config.")
}

fn sample_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn expect_validation_error(raw: String, needle: &str) {
	let cfg = parse(raw);
	let err = mx_config::validate(&cfg).expect_err("Expected a validation error.");

	match err {
		Error::Validation { message } => {
			assert!(message.contains(needle), "unexpected message: {message}");
		},
		other => panic!("Expected a validation error, got: {other}."),
	}
}

#[test]
fn sample_config_validates() {
	mx_config::validate(&sample_config()).expect("Expected the sample config to validate.");
}

#[test]
fn empty_binds_are_rejected() {
	expect_validation_error(
		sample_with("service", "http_bind", Value::String(" ".to_string())),
		"service.http_bind",
	);
	expect_validation_error(
		sample_with("service", "admin_bind", Value::String(String::new())),
		"service.admin_bind",
	);
}

#[test]
fn zero_vector_dim_is_rejected() {
	expect_validation_error(sample_with("storage", "vector_dim", Value::Integer(0)), "vector_dim");
}

#[test]
fn zero_batch_size_and_concurrency_are_rejected() {
	expect_validation_error(
		sample_with("matching", "batch_size", Value::Integer(0)),
		"matching.batch_size",
	);
	expect_validation_error(
		sample_with("matching", "max_concurrency", Value::Integer(0)),
		"matching.max_concurrency",
	);
}

#[test]
fn out_of_range_scores_and_penalties_are_rejected() {
	expect_validation_error(
		sample_with("matching", "default_min_score", Value::Float(1.5)),
		"default_min_score",
	);
	expect_validation_error(
		sample_with("matching", "level_step_penalty", Value::Float(-0.1)),
		"level_step_penalty",
	);
	expect_validation_error(
		sample_with("matching", "partial_region_credit", Value::Float(2.0)),
		"partial_region_credit",
	);
}

#[test]
fn retry_budget_must_be_coherent() {
	expect_validation_error(
		sample_with("matching.retry", "max_attempts", Value::Integer(0)),
		"retry.max_attempts",
	);
	expect_validation_error(
		sample_with("matching.retry", "max_backoff_ms", Value::Integer(1)),
		"max_backoff_ms",
	);
}

#[test]
fn matching_defaults_apply_when_omitted() {
	let raw = "\
[service]
http_bind  = \"127.0.0.1:8080\"
admin_bind = \"127.0.0.1:8081\"
log_level  = \"info\"

[storage]
vector_dim = 768

[storage.postgres]
dsn            = \"postgres://mx:mx@localhost:5432/mx\"
pool_max_conns = 8

[matching]
";
	let cfg = parse(raw.to_string());

	mx_config::validate(&cfg).expect("Expected defaults to validate.");
	assert_eq!(cfg.matching.batch_size, 25);
	assert_eq!(cfg.matching.max_concurrency, 4);
	assert_eq!(cfg.matching.default_max_results, 100);
	assert_eq!(cfg.matching.retry.max_attempts, 3);
}
