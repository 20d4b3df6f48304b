use std::fmt;

use unicode_normalization::UnicodeNormalization;

const KEY_SEPARATOR: char = '\u{1f}';
const SHORT_KEY_LEN: usize = 12;

/// Stable deduplication key for a (query, search type) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey(String);
impl DedupKey {
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Prefix suitable for log fields.
	pub fn short(&self) -> &str {
		let len = self.0.len().min(SHORT_KEY_LEN);

		&self.0[..len]
	}
}
impl fmt::Display for DedupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

pub fn canonical_query(query: &str) -> String {
	canonicalize(query)
}

pub fn canonical_search_type(search_type: &str) -> String {
	canonicalize(search_type)
}

pub fn dedup_key(query: &str, search_type: &str) -> DedupKey {
	let canonical = format!(
		"{}{KEY_SEPARATOR}{}",
		canonical_search_type(search_type),
		canonical_query(query)
	);

	DedupKey(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}

fn canonicalize(input: &str) -> String {
	let normalized: String = input.nfkc().collect();
	let mut out = String::with_capacity(normalized.len());

	for word in normalized.split_whitespace() {
		if !out.is_empty() {
			out.push(' ');
		}

		out.extend(word.chars().flat_map(char::to_lowercase));
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn casing_and_whitespace_do_not_change_the_key() {
		let a = dedup_key("  The   Hobbit ", "Title");
		let b = dedup_key("the hobbit", "title");
		let c = dedup_key("THE\tHOBBIT\n", " TITLE ");

		assert_eq!(a, b);
		assert_eq!(b, c);
	}

	#[test]
	fn search_type_is_part_of_the_key() {
		assert_ne!(dedup_key("tolkien", "author"), dedup_key("tolkien", "title"));
	}

	#[test]
	fn separator_prevents_boundary_collisions() {
		assert_ne!(dedup_key("b c", "a"), dedup_key("c", "a b"));
	}

	#[test]
	fn fullwidth_latin_folds_to_ascii() {
		assert_eq!(canonical_query("Ｄｕｎｅ"), "dune");
		assert_eq!(dedup_key("Ｄｕｎｅ", "title"), dedup_key("dune", "title"));
	}

	#[test]
	fn short_key_is_a_prefix() {
		let key = dedup_key("emma", "title");

		assert_eq!(key.short().len(), 12);
		assert!(key.as_str().starts_with(key.short()));
	}
}
