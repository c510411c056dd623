//! A module implementing lexical analysis (tokenization) of a single input line.
//!
//! The lexer is a small character-level state machine. It knows nothing about
//! operators: `|`, `>` and friends come out as ordinary tokens and are
//! recognized later by the redirection resolver and the pipeline splitter.

/// State of the lexing FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    /// Outside of any quotes.
    Bare,
    /// Inside `'...'`: everything is literal.
    InSingleQuote,
    /// Inside `"..."`: only `\$`, `\"` and `\\` are escapes.
    InDoubleQuote,
    /// The previous character was a backslash; the payload is the state to
    /// return to once the escaped character is consumed.
    Escaped(EscapeOrigin),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeOrigin {
    Bare,
    DoubleQuote,
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    buffer: String,
    tokens: Vec<String>,
}

impl<'a> LexingFSM<'a> {
    /// Creates a new instance of the lexical analysis Finite State Machine.
    fn new(line: &'a str) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Bare,
            buffer: String::new(),
            tokens: Vec::new(),
        }
    }

    /// Runs the FSM over the whole input and returns the collected tokens.
    ///
    /// Malformed input is never an error: an unterminated quote simply ends
    /// with the line and whatever was collected becomes the last token.
    fn make_tokens(mut self) -> Vec<String> {
        while let Some(ch) = self.input.next() {
            match self.state {
                LexingState::Bare => self.handle_bare(ch),
                LexingState::InSingleQuote => self.handle_single_quote(ch),
                LexingState::InDoubleQuote => self.handle_double_quote(ch),
                LexingState::Escaped(origin) => self.handle_escaped(ch, origin),
            }
        }

        self.finish_token();
        self.tokens
    }

    fn handle_bare(&mut self, ch: char) {
        match ch {
            c if c.is_whitespace() => self.finish_token(),
            '\'' => self.state = LexingState::InSingleQuote,
            '"' => self.state = LexingState::InDoubleQuote,
            '\\' => self.state = LexingState::Escaped(EscapeOrigin::Bare),
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::Bare,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::Bare,
            '\\' => self.state = LexingState::Escaped(EscapeOrigin::DoubleQuote),
            c => self.buffer.push(c),
        }
    }

    fn handle_escaped(&mut self, ch: char, origin: EscapeOrigin) {
        match origin {
            EscapeOrigin::Bare => {
                self.buffer.push(ch);
                self.state = LexingState::Bare;
            }
            EscapeOrigin::DoubleQuote => {
                if !matches!(ch, '$' | '"' | '\\') {
                    self.buffer.push('\\');
                }
                self.buffer.push(ch);
                self.state = LexingState::InDoubleQuote;
            }
        }
    }

    fn finish_token(&mut self) {
        if !self.buffer.is_empty() {
            self.tokens.push(std::mem::take(&mut self.buffer));
        }
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Splits `line` into tokens on unquoted, unescaped whitespace, removing
/// quotes and resolving backslash escapes along the way.
///
/// ```
/// use minish::lexer::split_into_tokens;
///
/// assert_eq!(split_into_tokens(r#"echo 'a  b' "c\"d""#), ["echo", "a  b", "c\"d"]);
/// ```
pub fn split_into_tokens(line: &str) -> Vec<String> {
    LexingFSM::new(line).make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<String> {
        split_into_tokens(line)
    }

    #[test]
    fn test_plain_words_and_whitespace() {
        assert_eq!(toks("echo  hello\tworld  "), vec!["echo", "hello", "world"]);
        assert!(toks("").is_empty());
        assert!(toks("   \t ").is_empty());
    }

    #[test]
    fn test_retokenizing_joined_tokens_is_stable() {
        let first = toks("ls   -la  /tmp   | grep  x");
        let second = toks(&first.join(" "));
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_quotes_are_literal() {
        assert_eq!(toks("echo 'a  b'"), vec!["echo", "a  b"]);
        assert_eq!(toks(r"echo 'x\ny\\'"), vec!["echo", r"x\ny\\"]);
        assert_eq!(toks(r#"echo 'say "hi"'"#), vec!["echo", r#"say "hi""#]);
    }

    #[test]
    fn test_adjacent_quoted_parts_join_one_token() {
        assert_eq!(toks("echo 'hello''world'"), vec!["echo", "helloworld"]);
        assert_eq!(toks(r#"echo a"b c"'d'"#), vec!["echo", "ab cd"]);
    }

    #[test]
    fn test_double_quote_escapes() {
        assert_eq!(toks(r#"echo "a\nb""#), vec!["echo", r"a\nb"]);
        assert_eq!(toks(r#"echo "a\"b""#), vec!["echo", "a\"b"]);
        assert_eq!(toks(r#"echo "a\\b""#), vec!["echo", r"a\b"]);
        assert_eq!(toks(r#"echo "\$HOME""#), vec!["echo", "$HOME"]);
        assert_eq!(toks(r#"echo "it's""#), vec!["echo", "it's"]);
    }

    #[test]
    fn test_backslash_outside_quotes() {
        assert_eq!(toks(r"echo a\ \ b"), vec!["echo", "a  b"]);
        assert_eq!(toks(r"echo \'quoted\'"), vec!["echo", "'quoted'"]);
        assert_eq!(toks(r"echo \n"), vec!["echo", "n"]);
        assert_eq!(toks(r"echo \\"), vec!["echo", r"\"]);
    }

    #[test]
    fn test_unterminated_quotes_are_tolerated() {
        assert_eq!(toks("echo 'abc def"), vec!["echo", "abc def"]);
        assert_eq!(toks(r#"echo "abc"#), vec!["echo", "abc"]);
        assert_eq!(toks(r"echo abc\"), vec!["echo", "abc"]);
    }

    #[test]
    fn test_empty_quotes_produce_nothing() {
        assert_eq!(toks("echo '' \"\""), vec!["echo"]);
    }

    #[test]
    fn test_operators_are_plain_tokens() {
        assert_eq!(
            toks("cat f 2>> err.log | wc"),
            vec!["cat", "f", "2>>", "err.log", "|", "wc"]
        );
    }
}
