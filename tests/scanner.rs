#[cfg(test)]
mod scanner_tests {
    use loxide as lox;

    use lox::error::LoxError;
    use lox::scanner::*;
    use lox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source.as_bytes().to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_compound_operators() {
        assert_token_sequence(
            "! != = == < <= > >=",
            &[
                (TokenType::BANG, "!"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL, "="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS, "<"),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER, ">"),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_comments_and_whitespace() {
        assert_token_sequence(
            "// ignored to end of line\n( )\t// trailing\n/",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::SLASH, "/"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_keywords_and_identifiers() {
        assert_token_sequence(
            "class foo var _bar while whileish",
            &[
                (TokenType::CLASS, "class"),
                (TokenType::IDENTIFIER, "foo"),
                (TokenType::VAR, "var"),
                (TokenType::IDENTIFIER, "_bar"),
                (TokenType::WHILE, "while"),
                (TokenType::IDENTIFIER, "whileish"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_string_literal_payload() {
        let mut scanner = Scanner::new("\"hello\"".as_bytes().to_vec());

        let token = scanner.next().unwrap().unwrap();

        assert_eq!(token.lexeme, "\"hello\"");
        assert!(matches!(&token.token_type, TokenType::STRING(s) if s == "hello"));
    }

    #[test]
    fn test_multiline_string_advances_line_counter() {
        let source = "\"a\nb\"\nfoo";
        let scanner = Scanner::new(source.as_bytes().to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        // The string opens on line 1; the identifier after it is on line 3.
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].lexeme, "foo");
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_unterminated_string_reports_opening_line() {
        let source = "\n\n\"never closed";
        let scanner = Scanner::new(source.as_bytes().to_vec());
        let errors: Vec<_> = scanner.filter_map(Result::err).collect();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "[line 3] Error: Unterminated string.");
    }

    #[test]
    fn test_number_literal_payloads() {
        let scanner = Scanner::new("42 3.14 123.".as_bytes().to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert!(matches!(tokens[0].token_type, TokenType::NUMBER(n) if n == 42.0));
        assert!(matches!(tokens[1].token_type, TokenType::NUMBER(n) if n == 3.14));

        // A trailing dot stays in the lexeme but parses to the integral value.
        assert_eq!(tokens[2].lexeme, "123.");
        assert!(matches!(tokens[2].token_type, TokenType::NUMBER(n) if n == 123.0));
    }

    #[test]
    fn test_token_print_form() {
        let scanner = Scanner::new("3 3.5 \"hi\" foo".as_bytes().to_vec());
        let printed: Vec<String> = scanner
            .filter_map(Result::ok)
            .map(|t| t.to_string())
            .collect();

        assert_eq!(
            printed,
            vec![
                "NUMBER 3 3.0",
                "NUMBER 3.5 3.5",
                "STRING \"hi\" hi",
                "IDENTIFIER foo null",
                "EOF  null",
            ]
        );
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let scanner = Scanner::new(source.as_bytes().to_vec());

        // Collect all results (both tokens and errors)
        let results: Vec<_> = scanner.collect();

        // We expect this sequence:
        // 0: COMMA ','
        // 1: DOT '.'
        // 2: Error for '$'
        // 3: LEFT_PAREN '('
        // 4: Error for '#'
        // 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(|e| e.to_string())
            .collect();

        assert_eq!(
            errors,
            vec![
                "[line 1] Error: Unexpected character: $",
                "[line 1] Error: Unexpected character: #",
            ]
        );

        fn assert_token_matches(
            result: &Result<Token, LoxError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(token.token_type, expected_type);
                    assert_eq!(token.lexeme, expected_lexeme);
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }

    #[test]
    fn test_eof_is_always_last() {
        for source in ["", "1 + 2", "$", "// only a comment"] {
            let scanner = Scanner::new(source.as_bytes().to_vec());
            let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

            let last = tokens.last().expect("EOF expected");
            assert_eq!(last.token_type, TokenType::EOF);
            assert_eq!(last.to_string(), "EOF  null");
        }
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let scanner = Scanner::new("foo\nbar".as_bytes().to_vec());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
    }
}
