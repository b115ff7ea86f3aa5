const INIT_SQL: &str = include_str!("../../../sql/init.sql");

/// Renders the schema with the deployment's embedding dimension substituted
/// into the `vector(..)` column type.
pub fn render_schema(vector_dim: u32) -> String {
	INIT_SQL.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn render_substitutes_vector_dim() {
		let sql = render_schema(768);

		assert!(sql.contains("vector(768)"));
		assert!(!sql.contains("<VECTOR_DIM>"));
	}

	#[test]
	fn render_declares_all_tables() {
		let sql = render_schema(16);

		for table in ["entities", "match_histories", "match_results"] {
			assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")), "{table}");
		}
	}
}
