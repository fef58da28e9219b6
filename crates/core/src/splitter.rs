//! Statement splitter
//!
//! The execution layer issues one statement per call, so multi-statement
//! script bodies have to be decomposed before running. This is a single-pass
//! state machine over the script text: a `;` only delimits a statement when
//! the scanner is outside single-quoted strings, double-quoted identifiers,
//! dollar-quoted blocks, line comments, and (nested) block comments.
//! Fragments containing nothing but comments and whitespace are dropped.

enum State {
    Normal,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment(u32),
    DollarQuote(Vec<char>),
}

/// Split a script body into individually executable statements.
///
/// Statements are returned trimmed, without the delimiting `;`, in their
/// original order. Comment-only and empty fragments contribute nothing.
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut buf = String::new();
    let mut has_executable = false;
    let mut state = State::Normal;
    let mut i = 0;

    let flush = |buf: &mut String, has_executable: &mut bool, statements: &mut Vec<String>| {
        let trimmed = buf.trim();
        if !trimmed.is_empty() && *has_executable {
            statements.push(trimmed.to_string());
        }
        buf.clear();
        *has_executable = false;
    };

    while i < chars.len() {
        let c = chars[i];
        match &state {
            State::Normal => {
                if c == ';' {
                    flush(&mut buf, &mut has_executable, &mut statements);
                    i += 1;
                    continue;
                }
                if c == '-' && chars.get(i + 1) == Some(&'-') {
                    buf.push_str("--");
                    state = State::LineComment;
                    i += 2;
                    continue;
                }
                if c == '/' && chars.get(i + 1) == Some(&'*') {
                    buf.push_str("/*");
                    state = State::BlockComment(1);
                    i += 2;
                    continue;
                }
                if c == '\'' {
                    state = State::SingleQuote;
                    has_executable = true;
                } else if c == '"' {
                    state = State::DoubleQuote;
                    has_executable = true;
                } else if c == '$' {
                    if let Some(tag) = dollar_tag_at(&chars, i) {
                        i += tag.len();
                        buf.extend(tag.iter());
                        state = State::DollarQuote(tag);
                        has_executable = true;
                        continue;
                    }
                    has_executable = true;
                } else if !c.is_whitespace() {
                    has_executable = true;
                }
                buf.push(c);
                i += 1;
            }
            State::SingleQuote => {
                buf.push(c);
                if c == '\'' {
                    // '' is an escaped quote, not a terminator
                    if chars.get(i + 1) == Some(&'\'') {
                        buf.push('\'');
                        i += 2;
                        continue;
                    }
                    state = State::Normal;
                }
                i += 1;
            }
            State::DoubleQuote => {
                buf.push(c);
                if c == '"' {
                    if chars.get(i + 1) == Some(&'"') {
                        buf.push('"');
                        i += 2;
                        continue;
                    }
                    state = State::Normal;
                }
                i += 1;
            }
            State::LineComment => {
                buf.push(c);
                if c == '\n' {
                    state = State::Normal;
                }
                i += 1;
            }
            State::BlockComment(depth) => {
                let depth = *depth;
                if c == '/' && chars.get(i + 1) == Some(&'*') {
                    buf.push_str("/*");
                    state = State::BlockComment(depth + 1);
                    i += 2;
                    continue;
                }
                if c == '*' && chars.get(i + 1) == Some(&'/') {
                    buf.push_str("*/");
                    state = if depth > 1 {
                        State::BlockComment(depth - 1)
                    } else {
                        State::Normal
                    };
                    i += 2;
                    continue;
                }
                buf.push(c);
                i += 1;
            }
            State::DollarQuote(tag) => {
                if c == '$' && chars[i..].starts_with(tag.as_slice()) {
                    let tag = tag.clone();
                    buf.extend(tag.iter());
                    i += tag.len();
                    state = State::Normal;
                    continue;
                }
                buf.push(c);
                i += 1;
            }
        }
    }

    flush(&mut buf, &mut has_executable, &mut statements);
    statements
}

/// If `chars[i..]` opens a dollar-quoted block (`$$` or `$tag$`), return the
/// full opener including both `$` signs.
fn dollar_tag_at(chars: &[char], i: usize) -> Option<Vec<char>> {
    debug_assert_eq!(chars[i], '$');
    let mut j = i + 1;
    while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
        j += 1;
    }
    if chars.get(j) == Some(&'$') {
        Some(chars[i..=j].to_vec())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_statements() {
        let sql = "CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "CREATE TABLE a (id INT)");
        assert_eq!(stmts[1], "CREATE TABLE b (id INT)");
    }

    #[test]
    fn keeps_trailing_statement_without_semicolon() {
        let stmts = split_statements("CREATE TABLE a (id INT)");
        assert_eq!(stmts, vec!["CREATE TABLE a (id INT)"]);
    }

    #[test]
    fn semicolon_inside_single_quotes_does_not_split() {
        let sql = "INSERT INTO t (v) VALUES ('a;b');";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0], "INSERT INTO t (v) VALUES ('a;b')");
    }

    #[test]
    fn escaped_quote_stays_inside_string() {
        let sql = "INSERT INTO t (v) VALUES ('it''s; fine'); SELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t (v) VALUES ('it''s; fine')");
    }

    #[test]
    fn semicolon_inside_quoted_identifier_does_not_split() {
        let sql = r#"CREATE TABLE "odd;name" (id INT);"#;
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn dollar_quoted_function_body_is_one_statement() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $$\nBEGIN\n  DELETE FROM t;\nEND;\n$$ LANGUAGE plpgsql;\nSELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("DELETE FROM t;"));
        assert_eq!(stmts[1], "SELECT 1");
    }

    #[test]
    fn tagged_dollar_quotes_respect_their_tag() {
        let sql = "DO $body$ SELECT '$$'; $body$;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].starts_with("DO $body$"));
        assert!(stmts[0].ends_with("$body$"));
    }

    #[test]
    fn line_comments_hide_semicolons() {
        let sql = "CREATE TABLE a (\n  id INT -- not a delimiter: ;\n);";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn nested_block_comments_hide_semicolons() {
        let sql = "SELECT 1 /* outer ; /* inner ; */ still out ; */;SELECT 2;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("SELECT 1"));
        assert_eq!(stmts[1], "SELECT 2");
    }

    #[test]
    fn comment_only_fragments_are_dropped() {
        let sql = "-- header comment\n;\n/* block only */;\nSELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts, vec!["SELECT 1"]);
    }

    #[test]
    fn empty_and_whitespace_input_yields_nothing() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("  \n\t ;;; \n").is_empty());
        assert!(split_statements("-- nothing here\n").is_empty());
    }

    #[test]
    fn comments_attached_to_a_statement_are_kept_with_it() {
        let sql = "-- creates the users table\nCREATE TABLE users (id INT);";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].contains("CREATE TABLE users"));
    }

    #[test]
    fn positional_params_are_not_mistaken_for_dollar_quotes() {
        let sql = "DELETE FROM t WHERE id = $1;SELECT 2;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
    }
}
