//! HTML entity decoding for inline bootstrap models.

/// Longest entity body considered; anything longer is literal text.
const MAX_ENTITY_LEN: usize = 10;

/// Decodes the HTML entities the server uses when embedding a model in a
/// `<script>` element.
///
/// Named entities `amp`, `lt`, `gt`, `quot` and `apos` are decoded, as are
/// decimal (`&#39;`) and hexadecimal (`&#x27;`) character references.
/// Anything else, including a bare `&`, is kept verbatim.
///
/// # Examples
///
/// ```
/// use taunus_runtime::html::unescape;
///
/// assert_eq!(unescape("{&quot;title&quot;:&quot;Hi&quot;}"), r#"{"title":"Hi"}"#);
/// assert_eq!(unescape("&lt;b&gt; &amp; &#x27;x&#39;"), "<b> & 'x'");
/// assert_eq!(unescape("fish & chips"), "fish & chips");
/// ```
pub fn unescape(text: &str) -> String {
	let mut result = String::with_capacity(text.len());
	let mut rest = text;

	while let Some(start) = rest.find('&') {
		result.push_str(&rest[..start]);
		rest = &rest[start..];

		let decoded = rest[1..]
			.find(';')
			.filter(|&end| end <= MAX_ENTITY_LEN)
			.and_then(|end| decode_entity(&rest[1..=end]).map(|ch| (ch, end + 2)));

		match decoded {
			Some((ch, consumed)) => {
				result.push(ch);
				rest = &rest[consumed..];
			}
			None => {
				result.push('&');
				rest = &rest[1..];
			}
		}
	}
	result.push_str(rest);
	result
}

fn decode_entity(entity: &str) -> Option<char> {
	match entity {
		"amp" => Some('&'),
		"lt" => Some('<'),
		"gt" => Some('>'),
		"quot" => Some('"'),
		"apos" => Some('\''),
		_ => {
			let reference = entity.strip_prefix('#')?;
			let code = match reference.strip_prefix(['x', 'X']) {
				Some(hex) => u32::from_str_radix(hex, 16).ok()?,
				None => reference.parse::<u32>().ok()?,
			};
			char::from_u32(code)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("&lt;div&gt;", "<div>")]
	#[case("&amp;amp;", "&amp;")]
	#[case("&#x3C;&#X3e;", "<>")]
	#[case("&#128512;", "\u{1F600}")]
	#[case("a &unknown; b", "a &unknown; b")]
	#[case("trailing &", "trailing &")]
	#[case("&#xZZ;", "&#xZZ;")]
	#[case("no entities", "no entities")]
	fn test_unescape(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(unescape(input), expected);
	}

	#[rstest]
	fn test_ampersand_without_terminator_keeps_following_text() {
		assert_eq!(unescape("a & b; c &lt;"), "a & b; c <");
	}

	#[rstest]
	fn test_unescaped_model_parses_as_json() {
		let raw = "{&quot;title&quot;:&quot;Tom &amp; Jerry&quot;}";
		let model: serde_json::Value = serde_json::from_str(&unescape(raw)).unwrap();
		assert_eq!(model["title"], "Tom & Jerry");
	}
}
