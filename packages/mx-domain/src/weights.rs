use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
	Skills,
	Experience,
	Proficiency,
	Location,
	DomainTags,
}
impl Dimension {
	pub const ALL: [Self; 5] =
		[Self::Skills, Self::Experience, Self::Proficiency, Self::Location, Self::DomainTags];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Skills => "skills",
			Self::Experience => "experience",
			Self::Proficiency => "proficiency",
			Self::Location => "location",
			Self::DomainTags => "domain_tags",
		}
	}

	pub fn parse(name: &str) -> Option<Self> {
		match name {
			"skills" => Some(Self::Skills),
			"experience" => Some(Self::Experience),
			"proficiency" => Some(Self::Proficiency),
			"location" => Some(Self::Location),
			"domain_tags" => Some(Self::DomainTags),
			_ => None,
		}
	}
}

/// Validated per-dimension weights, normalized so the weights of the
/// dimensions actually present sum to 1. A dimension with weight 0 (or
/// omitted) is excluded from normalization entirely rather than scored with
/// zero contribution at full weight.
#[derive(Clone, Debug, PartialEq)]
pub struct Weights {
	normalized: BTreeMap<Dimension, f32>,
}
impl Weights {
	/// Validates a raw name->weight map. Unknown names, negative values, and
	/// non-finite values are rejected before any scoring begins.
	pub fn resolve(raw: &BTreeMap<String, f32>) -> Result<Self> {
		let mut present = BTreeMap::new();

		for (name, weight) in raw {
			let Some(dimension) = Dimension::parse(name) else {
				return Err(Error::InvalidWeightConfiguration {
					message: format!("Unknown dimension name: {name}."),
				});
			};

			if !weight.is_finite() {
				return Err(Error::InvalidWeightConfiguration {
					message: format!("Weight for {name} must be a finite number."),
				});
			}
			if *weight < 0.0 {
				return Err(Error::InvalidWeightConfiguration {
					message: format!("Weight for {name} must be zero or greater."),
				});
			}
			if *weight > 0.0 {
				present.insert(dimension, *weight);
			}
		}

		if present.is_empty() {
			return Err(Error::InvalidWeightConfiguration {
				message: "At least one dimension must carry a positive weight.".to_string(),
			});
		}

		let total: f32 = present.values().sum();

		for weight in present.values_mut() {
			*weight /= total;
		}

		Ok(Self { normalized: present })
	}

	/// All five dimensions weighted equally.
	pub fn uniform() -> Self {
		let share = 1.0 / Dimension::ALL.len() as f32;

		Self { normalized: Dimension::ALL.iter().map(|dim| (*dim, share)).collect() }
	}

	pub fn iter(&self) -> impl Iterator<Item = (Dimension, f32)> + '_ {
		self.normalized.iter().map(|(dim, weight)| (*dim, *weight))
	}

	pub fn contains(&self, dimension: Dimension) -> bool {
		self.normalized.contains_key(&dimension)
	}

	pub fn len(&self) -> usize {
		self.normalized.len()
	}

	pub fn is_empty(&self) -> bool {
		self.normalized.is_empty()
	}
}
