//! Shell-like splitting of slash-command text.
//!
//! Tokens are separated by whitespace. A double-quoted span is kept as part of
//! a single token with the quotes removed, so `"seo tips" "long body"` yields
//! two tokens. There are no escape sequences.

use crate::errors::RelayError;

pub fn split_arguments(command: &str, raw_text: &str) -> Result<Vec<String>, RelayError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    // Set once a quote has been seen in the current token so `""` survives as an empty token.
    let mut quoted = false;

    for character in raw_text.chars() {
        if in_quotes {
            match character {
                '"' => in_quotes = false,
                _ => current.push(character),
            }
            continue;
        }

        match character {
            '"' => {
                in_quotes = true;
                quoted = true;
            }
            _ if character.is_whitespace() => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => current.push(character),
        }
    }

    if in_quotes {
        return Err(RelayError::malformed(
            command,
            raw_text,
            format!(
                "Could not parse the arguments for {command}: a double quote is not closed. \
                 Make sure to enclose each argument with double quotes."
            ),
        ));
    }
    if !current.is_empty() || quoted {
        tokens.push(current);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::split_arguments;
    use crate::errors::RelayError;

    #[test]
    fn splits_on_whitespace() {
        let tokens = split_arguments("/mail", "  alice   bob\tnotes ").expect("balanced");
        assert_eq!(tokens, vec!["alice", "bob", "notes"]);
    }

    #[test]
    fn quoted_spans_are_single_tokens_without_quotes() {
        let tokens =
            split_arguments("/blog", r#""seo, growth" "How Amersfoort improves transport""#)
                .expect("balanced");
        assert_eq!(tokens, vec!["seo, growth", "How Amersfoort improves transport"]);
    }

    #[test]
    fn quotes_may_open_inside_a_token() {
        let tokens = split_arguments("/blog", r#"key"word list" tail"#).expect("balanced");
        assert_eq!(tokens, vec!["keyword list", "tail"]);
    }

    #[test]
    fn empty_quotes_produce_an_empty_token() {
        let tokens = split_arguments("/blog", r#""" body"#).expect("balanced");
        assert_eq!(tokens, vec!["", "body"]);
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert!(split_arguments("/blog", "   ").expect("balanced").is_empty());
    }

    #[test]
    fn single_quotes_are_ordinary_characters() {
        let tokens = split_arguments("/blog", "it's fine").expect("balanced");
        assert_eq!(tokens, vec!["it's", "fine"]);
    }

    #[test]
    fn unbalanced_quote_is_malformed() {
        let error = split_arguments("/blog", r#""seo tips body"#).expect_err("unbalanced");
        match error {
            RelayError::MalformedArguments { command, raw_text, reason } => {
                assert_eq!(command, "/blog");
                assert_eq!(raw_text, r#""seo tips body"#);
                assert!(reason.contains("not closed"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn token_count_matches_top_level_fields() {
        let cases = [
            ("a b c", 3),
            (r#""a b" c"#, 2),
            (r#""a b c""#, 1),
            (r#"a "b c" "d e f" g"#, 4),
            ("", 0),
        ];
        for (input, expected) in cases {
            let tokens = split_arguments("/x", input).expect("balanced");
            assert_eq!(tokens.len(), expected, "input: {input}");
        }
    }
}
