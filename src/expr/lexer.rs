use super::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    /// 1-based character column where the token starts.
    pub column: usize,
}

/// Longest first, so `===` wins over `==`.
const PUNCTUATORS: [&str; 31] = [
    "===", "!==", "?.", "??", "=>", "==", "!=", "<=", ">=", "&&", "||", ".", "[", "]", "(", ")",
    ",", ":", "?", "!", "+", "-", "*", "/", "%", "<", ">", "{", "}", ";", "=",
];

/// Characters that exist only to produce a clearer error.
const REJECTED: [&str; 4] = ["{", "}", ";", "="];

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ExprError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let starts_fraction = c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit);
        let token = if c.is_ascii_digit() || starts_fraction {
            let (number, next) = lex_number(&chars, i)?;
            i = next;
            Token::Number(number)
        } else if c == '\'' || c == '"' {
            let (text, next) = lex_string(&chars, i)?;
            i = next;
            Token::Str(text)
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_part(chars[i]) {
                i += 1;
            }
            Token::Ident(chars[start..i].iter().collect())
        } else {
            let punct = PUNCTUATORS
                .into_iter()
                .find(|p| matches_at(&chars, i, p))
                .ok_or_else(|| ExprError::syntax(column, format!("unexpected character '{c}'")))?;
            if REJECTED.contains(&punct) {
                return Err(ExprError::syntax(column, format!("'{punct}' is not supported")));
            }
            // `a?.5:b` is a conditional, not optional chaining.
            if punct == "?." && chars.get(i + 2).is_some_and(char::is_ascii_digit) {
                i += 1;
                Token::Punct("?")
            } else {
                i += punct.chars().count();
                Token::Punct(punct)
            }
        };
        tokens.push(Spanned { token, column });
    }

    Ok(tokens)
}

fn matches_at(chars: &[char], at: usize, punct: &str) -> bool {
    let mut i = at;
    for expected in punct.chars() {
        if chars.get(i) != Some(&expected) {
            return false;
        }
        i += 1;
    }
    true
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn lex_number(chars: &[char], start: usize) -> Result<(f64, usize), ExprError> {
    let mut i = start;
    if chars[i] == '0' && matches!(chars.get(i + 1), Some('x' | 'X')) {
        i += 2;
        let digits_start = i;
        while i < chars.len() && chars[i].is_ascii_hexdigit() {
            i += 1;
        }
        let digits: String = chars[digits_start..i].iter().collect();
        let value = u64::from_str_radix(&digits, 16)
            .map_err(|_| ExprError::syntax(start + 1, "malformed hex literal"))?;
        return Ok((value as f64, i));
    }

    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+' | '-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(char::is_ascii_digit) {
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    if chars.get(i).is_some_and(|c| is_ident_start(*c)) {
        return Err(ExprError::syntax(i + 1, "identifier directly after number"));
    }

    let text: String = chars[start..i].iter().collect();
    text.parse::<f64>()
        .map(|value| (value, i))
        .map_err(|_| ExprError::syntax(start + 1, format!("malformed number '{text}'")))
}

fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), ExprError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while let Some(&c) = chars.get(i) {
        i += 1;
        if c == quote {
            return Ok((text, i));
        }
        if c != '\\' {
            text.push(c);
            continue;
        }
        let Some(&escaped) = chars.get(i) else {
            break;
        };
        i += 1;
        match escaped {
            'n' => text.push('\n'),
            't' => text.push('\t'),
            'r' => text.push('\r'),
            '0' => text.push('\0'),
            'x' | 'u' => {
                let width = if escaped == 'x' { 2 } else { 4 };
                let digits: String = chars.iter().skip(i).take(width).collect();
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ExprError::syntax(i, "malformed escape sequence"))?;
                text.push(decoded);
                i += width;
            }
            other => text.push(other),
        }
    }

    Err(ExprError::syntax(start + 1, "unterminated string"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn longest_punctuator_wins() {
        assert_eq!(
            kinds("a !== b ?? c"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("!=="),
                Token::Ident("b".into()),
                Token::Punct("??"),
                Token::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn question_dot_before_digit_is_a_conditional() {
        assert_eq!(
            kinds("a?.5:1"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("?"),
                Token::Number(0.5),
                Token::Punct(":"),
                Token::Number(1.0),
            ]
        );
    }

    #[test]
    fn strings_decode_escapes() {
        assert_eq!(kinds(r#"'it\'s' "\x41B""#), vec![
            Token::Str("it's".into()),
            Token::Str("AB".into()),
        ]);
    }

    #[test]
    fn assignment_and_blocks_are_rejected() {
        assert!(tokenize("a = 1").is_err());
        assert!(tokenize("{}").is_err());
        assert!(tokenize("a & b").is_err());
        assert!(tokenize("`x`").is_err());
        assert!(tokenize("'open").is_err());
    }

    #[test]
    fn numbers_in_several_notations() {
        assert_eq!(
            kinds("0x1F 1.5e3 .25 7"),
            vec![
                Token::Number(31.0),
                Token::Number(1500.0),
                Token::Number(0.25),
                Token::Number(7.0),
            ]
        );
    }
}
