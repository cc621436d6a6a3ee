use crate::alias::AliasStore;
use crate::env::VariableStore;
use crate::lexer::LexingFSM;

/// How a redirect target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// `>`: truncate the target, creating it if missing.
    Rewrite,
    /// `>>`: append to the target, creating it if missing.
    Append,
}

/// Which output stream of an invocation a redirect replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStream {
    /// `>` or `1>`.
    Stdout,
    /// `2>`.
    Stderr,
}

/// An output redirection attached to a single invocation.
///
/// The target is kept as written; it is resolved against the tracked current
/// directory only when the invocation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub target: String,
    pub mode: RedirectMode,
    pub stream: RedirectStream,
}

/// One command name plus its fully expanded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub arguments: Vec<String>,
    /// At most one redirect; when several are written the last one wins.
    pub redirect: Option<Redirect>,
}

impl Invocation {
    pub fn new(command: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            command: command.into(),
            arguments,
            redirect: None,
        }
    }

    pub fn with_redirect(mut self, redirect: Redirect) -> Self {
        self.redirect = Some(redirect);
        self
    }
}

/// The invocations of one input line, in `|` order. Never empty.
pub type Pipeline = Vec<Invocation>;

/// Turn one raw input line into a pipeline.
///
/// Quotes, escapes, `$NAME` substitution, redirects and alias substitution are all
/// resolved here. Parsing never fails: an unterminated quote runs to the end of the
/// line, a trailing backslash is dropped, and a blank line yields a single
/// invocation with an empty command name.
pub fn parse(line: &str, aliases: &AliasStore, vars: &VariableStore) -> Pipeline {
    LexingFSM::new(line.trim(), aliases, vars).make_invocations()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_plain(line: &str) -> Pipeline {
        parse(line, &AliasStore::default(), &VariableStore::default())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_simple_command() {
        let result = parse_plain("echo");
        assert_eq!(result, vec![Invocation::new("echo", vec![])]);
    }

    #[test]
    fn splits_arguments_on_spaces() {
        let result = parse_plain("   echo    hello    world   ");
        assert_eq!(result, vec![Invocation::new("echo", args(&["hello", "world"]))]);
    }

    #[test]
    fn blank_line_yields_empty_command() {
        for line in ["", "    "] {
            let result = parse_plain(line);
            assert_eq!(result, vec![Invocation::new("", vec![])]);
        }
    }

    #[test]
    fn quoted_command_name() {
        let result = parse_plain("'my command' arg1");
        assert_eq!(result[0].command, "my command");
        assert_eq!(result[0].arguments, args(&["arg1"]));

        let result = parse_plain("\"my command\" arg1");
        assert_eq!(result[0].command, "my command");
        assert_eq!(result[0].arguments, args(&["arg1"]));
    }

    #[test]
    fn single_quotes_are_verbatim() {
        assert_eq!(parse_plain("echo 'hello world'")[0].arguments, args(&["hello world"]));
        assert_eq!(parse_plain("echo 'a\\\"b'")[0].arguments, args(&["a\\\"b"]));
        assert_eq!(parse_plain("echo 'hello\\world'")[0].arguments, args(&["hello\\world"]));
        assert_eq!(parse_plain("echo 'hello''world'")[0].arguments, args(&["helloworld"]));
        assert_eq!(parse_plain("echo '$PATH'")[0].arguments, args(&["$PATH"]));
    }

    #[test]
    fn empty_quotes_produce_no_argument() {
        assert!(parse_plain("echo ''")[0].arguments.is_empty());
        assert!(parse_plain("echo \"\"")[0].arguments.is_empty());
    }

    #[test]
    fn quote_inside_other_quote_is_literal() {
        assert_eq!(parse_plain("echo \"hello 'world'\"")[0].arguments, args(&["hello 'world'"]));
        assert_eq!(parse_plain("echo 'hello \"world\"'")[0].arguments, args(&["hello \"world\""]));
    }

    #[test]
    fn double_quote_escapes_only_special_characters() {
        assert_eq!(parse_plain(r#"echo "a\"b""#)[0].arguments, args(&["a\"b"]));
        assert_eq!(parse_plain(r#"echo "a\\b""#)[0].arguments, args(&["a\\b"]));
        assert_eq!(parse_plain(r#"echo "a\$b""#)[0].arguments, args(&["a$b"]));
        assert_eq!(parse_plain(r#"echo "a\`b""#)[0].arguments, args(&["a`b"]));
        assert_eq!(parse_plain(r#"echo "a\nb""#)[0].arguments, args(&["a\\nb"]));
    }

    #[test]
    fn backslash_outside_quotes_escapes_anything() {
        assert_eq!(parse_plain(r"echo hello\ world")[0].arguments, args(&["hello world"]));
        assert_eq!(parse_plain(r"echo hello\\world")[0].arguments, args(&["hello\\world"]));
        assert_eq!(
            parse_plain(r#"echo \$HOME \"quoted\""#)[0].arguments,
            args(&["$HOME", "\"quoted\""])
        );
        assert_eq!(parse_plain(r"echo \\\\")[0].arguments, args(&["\\\\"]));
    }

    #[test]
    fn trailing_backslash_is_dropped() {
        assert_eq!(parse_plain("echo test\\")[0].arguments, args(&["test"]));
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        assert_eq!(parse_plain("echo 'partial line")[0].arguments, args(&["partial line"]));
    }

    #[test]
    fn splits_pipeline_stages() {
        let result = parse_plain("cmd a b | cmd2 c");
        assert_eq!(
            result,
            vec![
                Invocation::new("cmd", args(&["a", "b"])),
                Invocation::new("cmd2", args(&["c"])),
            ]
        );

        let result = parse_plain("cat file | grep pattern   |   wc -l");
        let names: Vec<_> = result.iter().map(|i| i.command.as_str()).collect();
        assert_eq!(names, vec!["cat", "grep", "wc"]);
        assert_eq!(result[2].arguments, args(&["-l"]));
    }

    #[test]
    fn pipe_directly_after_word_keeps_the_word() {
        let result = parse_plain("echo hello|cat");
        assert_eq!(result[0], Invocation::new("echo", args(&["hello"])));
        assert_eq!(result[1], Invocation::new("cat", vec![]));

        let result = parse_plain("pwd| cat");
        assert_eq!(result[0].command, "pwd");
        assert_eq!(result[1].command, "cat");
    }

    #[test]
    fn pipe_inside_quotes_still_splits() {
        let result = parse_plain("echo 'a|b' | cat");
        let names: Vec<_> = result.iter().map(|i| i.command.as_str()).collect();
        assert_eq!(names, vec!["echo", "b'", "cat"]);
        assert_eq!(result[0].arguments, args(&["a"]));
    }

    #[test]
    fn parses_stdout_redirects() {
        let expected = Redirect {
            target: "out.txt".into(),
            mode: RedirectMode::Rewrite,
            stream: RedirectStream::Stdout,
        };
        for line in ["echo x > out.txt", "echo x 1> out.txt", "echo x >out.txt", "echo x >    out.txt"] {
            let result = parse_plain(line);
            assert_eq!(result.len(), 1, "{line}");
            assert_eq!(result[0].arguments, args(&["x"]), "{line}");
            assert_eq!(result[0].redirect.as_ref(), Some(&expected), "{line}");
        }

        let result = parse_plain("echo x 1>> out.txt");
        assert_eq!(result[0].redirect.as_ref().map(|r| r.mode), Some(RedirectMode::Append));
    }

    #[test]
    fn parses_stderr_redirects() {
        let result = parse_plain("cmd 2>> err.log");
        assert_eq!(
            result[0].redirect,
            Some(Redirect {
                target: "err.log".into(),
                mode: RedirectMode::Append,
                stream: RedirectStream::Stderr,
            })
        );
        assert!(result[0].arguments.is_empty());

        let result = parse_plain("cmd 2> err.log");
        assert_eq!(result[0].redirect.as_ref().map(|r| r.mode), Some(RedirectMode::Rewrite));
    }

    #[test]
    fn redirect_belongs_to_its_stage() {
        let result = parse_plain("cat file.txt | grep pattern > /tmp/output.txt");
        assert_eq!(result.len(), 2);
        assert!(result[0].redirect.is_none());
        assert_eq!(result[1].redirect.as_ref().map(|r| r.target.as_str()), Some("/tmp/output.txt"));
        assert_eq!(result[1].arguments, args(&["pattern"]));
    }

    #[test]
    fn greater_than_inside_quotes_is_text() {
        let result = parse_plain("echo 'a > b'");
        assert_eq!(result[0].arguments, args(&["a > b"]));
        assert!(result[0].redirect.is_none());
    }

    #[test]
    fn substitutes_variables() {
        let mut vars = VariableStore::default();
        vars.define("foo", "bar");
        let aliases = AliasStore::default();

        let result = parse("echo $foo", &aliases, &vars);
        assert_eq!(result[0].arguments, args(&["bar"]));

        let result = parse("echo pre${foo}", &aliases, &vars);
        assert_eq!(result[0].arguments, args(&["pre${foo}"]));

        let result = parse("echo \"$foo baz\" '$foo' x$foo.y", &aliases, &vars);
        assert_eq!(result[0].arguments, args(&["bar baz", "$foo", "xbar.y"]));
    }

    #[test]
    fn unset_variable_is_an_empty_argument() {
        let result = parse_plain("echo $foo");
        assert_eq!(result[0].arguments, args(&[""]));

        let result = parse_plain("echo a $foo b");
        assert_eq!(result[0].arguments, args(&["a", "", "b"]));
    }

    #[test]
    fn bare_dollar_is_literal() {
        assert_eq!(parse_plain("echo $ a$")[0].arguments, args(&["$", "a$"]));
    }

    fn aliases(pairs: &[(&str, &str)]) -> AliasStore {
        let mut store = AliasStore::default();
        for (name, value) in pairs {
            store.define(*name, *value);
        }
        store
    }

    #[test]
    fn alias_expands_leading_word() {
        let store = aliases(&[("ll", "ls -la")]);
        let vars = VariableStore::default();

        assert_eq!(parse("ll", &store, &vars), vec![Invocation::new("ls", args(&["-la"]))]);
        assert_eq!(
            parse("ll /tmp", &store, &vars),
            vec![Invocation::new("ls", args(&["-la", "/tmp"]))]
        );
        assert_eq!(parse("echo ll", &store, &vars)[0].arguments, args(&["ll"]));
    }

    #[test]
    fn alias_may_introduce_stages() {
        let store = aliases(&[("greplogs", "cat /tmp/test | grep foo")]);
        let result = parse("greplogs", &store, &VariableStore::default());
        let names: Vec<_> = result.iter().map(|i| i.command.as_str()).collect();
        assert_eq!(names, vec!["cat", "grep"]);
    }

    #[test]
    fn alias_expands_in_every_stage() {
        let store = aliases(&[("up", "tr a-z A-Z")]);
        let result = parse("echo hi | up", &store, &VariableStore::default());
        assert_eq!(result[1], Invocation::new("tr", args(&["a-z", "A-Z"])));
    }

    #[test]
    fn self_referencing_alias_does_not_loop() {
        let store = aliases(&[("ls", "ls --color")]);
        let result = parse("ls", &store, &VariableStore::default());
        assert_eq!(result, vec![Invocation::new("ls", args(&["--color"]))]);
    }

    #[test]
    fn chained_aliases_expand_until_a_repeat() {
        let store = aliases(&[("ll", "myls -la"), ("myls", "ls --color"), ("a", "b"), ("b", "a x")]);
        let vars = VariableStore::default();

        let result = parse("ll", &store, &vars);
        assert_eq!(result, vec![Invocation::new("ls", args(&["--color", "-la"]))]);

        let result = parse("a", &store, &vars);
        assert_eq!(result, vec![Invocation::new("a", args(&["x"]))]);
    }

    #[test]
    fn alias_piping_into_itself_stops() {
        let store = aliases(&[("a", "echo x | a")]);

        let result = parse("a", &store, &VariableStore::default());

        assert_eq!(
            result,
            vec![Invocation::new("echo", args(&["x"])), Invocation::new("a", vec![])]
        );
    }

    #[test]
    fn alias_cycle_through_pipes_stops() {
        let store = aliases(&[("a", "echo 1 | b"), ("b", "echo 2 | a")]);

        let result = parse("a", &store, &VariableStore::default());
        let names: Vec<_> = result.iter().map(|i| i.command.as_str()).collect();

        assert_eq!(names, vec!["echo", "echo", "a"]);
    }

    #[test]
    fn same_alias_in_separate_stages_expands_each_time() {
        let store = aliases(&[("ll", "ls -l")]);

        let result = parse("ll | ll", &store, &VariableStore::default());

        assert_eq!(result, vec![Invocation::new("ls", args(&["-l"])); 2]);
    }
}
