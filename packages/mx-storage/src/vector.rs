use crate::{Error, Result};

/// Encodes a vector into the pgvector text form, `[v1,v2,...]`.
pub fn vector_to_pg(values: &[f32]) -> String {
	let parts = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();

	format!("[{}]", parts.join(","))
}

/// Parses the pgvector text form back into components.
pub fn parse_pg_vector(raw: &str) -> Result<Vec<f32>> {
	let trimmed = raw.trim();
	let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
		return Err(Error::InvalidArgument(format!("Malformed vector literal: {trimmed:?}.")));
	};

	if inner.trim().is_empty() {
		return Ok(Vec::new());
	}

	inner
		.split(',')
		.map(|part| {
			part.trim().parse::<f32>().map_err(|_| {
				Error::InvalidArgument(format!("Malformed vector component: {part:?}."))
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_text_form() {
		let v = vec![0.25_f32, -1.0, 3.5];
		let text = vector_to_pg(&v);

		assert_eq!(text, "[0.25,-1,3.5]");
		assert_eq!(parse_pg_vector(&text).unwrap(), v);
	}

	#[test]
	fn parses_spaced_components() {
		assert_eq!(parse_pg_vector("[1.0, 2.0, 3.0]").unwrap(), vec![1.0, 2.0, 3.0]);
	}

	#[test]
	fn empty_vector_parses() {
		assert!(parse_pg_vector("[]").unwrap().is_empty());
	}

	#[test]
	fn rejects_malformed_literals() {
		assert!(parse_pg_vector("1,2,3").is_err());
		assert!(parse_pg_vector("[1,two,3]").is_err());
	}
}
