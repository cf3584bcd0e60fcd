//! Integration tests for validation groups, required elements and validators.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use cmdtree_core::{
    Application, Arg, Command, Error, ErrorKind, Flag, FlagArg, ValueKind, ValueType,
};
use tempfile::TempDir;

use common::{path_str, touch};

/// `test command1 ( -f <filename> | <resource-type> <resource-name> | sub-com <resource-name> )`
fn optional_subcommand_app() -> Application {
    Application::new("test").with_subcommand(
        Command::new("command1")
            .with_subcommand(
                Command::new("sub-com")
                    .with_description("Optional sub-command")
                    .with_groups(["subcommand"])
                    .with_optional(true),
            )
            .with_flag(
                Flag::choice("output", ["json", "table", "yaml"])
                    .with_short('o')
                    .with_default("table"),
            )
            .with_flag(
                Flag::new("filename", ValueType::many(ValueKind::File))
                    .with_short('f')
                    .with_groups(["file"]),
            )
            .with_arg(Arg::text("resource-type").with_groups(["name"]))
            .with_arg(Arg::text("resource-name").with_groups(["name", "subcommand"])),
    )
}

/// `sub-com` shares the `sub-com` group with both positionals, and
/// `resource-type` is required.
fn nested_app(optional: bool) -> Application {
    let mut sub = Command::new("sub-com")
        .with_flag(Flag::new("from", ValueType::one(ValueKind::Timestamp)).with_short('r'))
        .with_flag(Flag::new("to", ValueType::one(ValueKind::Timestamp)).with_short('t'));
    if optional {
        sub = sub.with_optional(true).with_groups(["sub-com"]);
    }
    Application::new("test").with_subcommand(
        Command::new("command1")
            .with_subcommand(sub)
            .with_flag(Flag::choice("output", ["json", "table"]).with_short('o'))
            .with_flag(
                Flag::new("filename", ValueType::many(ValueKind::File))
                    .with_short('f')
                    .with_groups(["file"]),
            )
            .with_arg(
                Arg::text("resource-type")
                    .with_groups(["name", "sub-com"])
                    .with_required(true),
            )
            .with_arg(Arg::text("resource-name").with_groups(["name", "sub-com"])),
    )
}

fn check(mut app: Application, argv: Vec<String>) -> Result<Application, Error> {
    app.parse(argv)?;
    app.validate()?;
    Ok(app)
}

fn argv(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

// ---- group selection ----

#[test]
fn test_optional_subcommand_groups() {
    let dir = TempDir::new().unwrap();
    let file = path_str(&touch(dir.path(), &["test2.txt"])[0]);

    let cases: Vec<(&str, Vec<String>, Option<ErrorKind>)> = vec![
        (
            "filename only",
            vec!["command1".into(), "-o".into(), "json".into(), "-f".into(), file.clone()],
            None,
        ),
        (
            "type and name",
            argv(&["command1", "-o", "json", "my_type", "my_name"]),
            None,
        ),
        (
            "sub-command and name",
            argv(&["command1", "-o", "json", "sub-com", "my_name"]),
            None,
        ),
        (
            "sub-command takes one argument",
            argv(&["command1", "-o", "json", "sub-com", "my_type", "my_name"]),
            Some(ErrorKind::UnknownArgument),
        ),
        (
            "filename and type",
            vec![
                "command1".into(),
                "-f".into(),
                file.clone(),
                "my_type".into(),
                "my_name".into(),
            ],
            Some(ErrorKind::FlagsArgsFromMultipleGroups),
        ),
        ("nothing selected", argv(&["command1"]), None),
    ];

    for (name, tokens, expected) in cases {
        let result = check(optional_subcommand_app(), tokens);
        match expected {
            None => assert!(result.is_ok(), "{name}: {:?}", result.err()),
            Some(kind) => {
                let err = result.err().unwrap_or_else(|| panic!("{name}: expected {kind}"));
                assert_eq!(err.kind(), kind, "{name}: {err}");
            }
        }
    }
}

#[test]
fn test_sub_command_scope_drops_other_groups() {
    let app = check(
        optional_subcommand_app(),
        argv(&["command1", "sub-com", "my_name"]),
    )
    .unwrap();
    assert_eq!(app.full_command(), "test command1 sub-com");
    assert!(app.arg("resource-type").is_err());
    assert!(app.flag("filename").is_err());
    assert_eq!(app.arg_value("resource-name").unwrap().as_str(), Some("my_name"));
    assert_eq!(app.flag_value("output").unwrap().as_str(), Some("table"));
}

#[test]
fn test_conflict_names_both_elements() {
    let mut app = Application::new("kubectl").with_subcommand(
        Command::new("delete")
            .with_flag(Flag::text("filename").with_short('f').with_groups(["g1"]))
            .with_flag(Flag::text("selector").with_groups(["g1"]))
            .with_arg(Arg::text("type").with_groups(["g2"]))
            .with_arg(Arg::text("name").with_groups(["g2"])),
    );

    app.parse(["delete", "-f", "x.yaml", "pods", "web"]).unwrap();
    let err = app.validate().unwrap_err();
    match err {
        Error::FlagsArgsFromMultipleGroups { first, second } => {
            let mut both = [first, second];
            both.sort();
            assert_eq!(both, ["--filename".to_string(), "<type>".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }

    app.parse(["delete", "-f", "x.yaml", "--selector", "app=web"]).unwrap();
    app.validate().unwrap();

    app.parse(["delete", "pods", "web"]).unwrap();
    app.validate().unwrap();
}

#[test]
fn test_flag_and_argument_group_excludes_argument_pair() {
    let app = || {
        Application::new("app")
            .with_flag(Flag::text("a").with_groups(["g1"]))
            .with_arg(Arg::text("type").with_groups(["g2"]))
            .with_arg(Arg::text("name").with_groups(["g2"]))
            .with_arg(Arg::text("b").with_groups(["g1"]))
    };

    let cases = [
        ("a only", argv(&["--a", "x"]), None),
        ("type and name only", argv(&["pod", "web"]), None),
        (
            "a with type and name",
            argv(&["--a", "x", "pod", "web"]),
            Some(ErrorKind::FlagsArgsFromMultipleGroups),
        ),
    ];

    for (name, tokens, expected) in cases {
        let result = check(app(), tokens);
        match expected {
            None => assert!(result.is_ok(), "{name}: {:?}", result.err()),
            Some(kind) => {
                let err = result.err().unwrap_or_else(|| panic!("{name}: expected {kind}"));
                assert_eq!(err.kind(), kind, "{name}: {err}");
            }
        }
    }
}

#[test]
fn test_ambiguous_groups_without_unique_member() {
    let mut app = Application::new("app")
        .with_flag(Flag::text("a").with_groups(["g1", "g2"]))
        .with_flag(Flag::text("b").with_groups(["g2", "g3"]));
    app.parse(Vec::<String>::new()).unwrap();
    let err = app.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoUniqueFlagArgCommandInGroup);

    let mut app = Application::new("app")
        .with_flag(Flag::text("a").with_groups(["g1", "g2"]))
        .with_flag(Flag::text("b").with_groups(["g2"]));
    app.parse(Vec::<String>::new()).unwrap();
    app.validate().unwrap();
}

// ---- leaf and required checks ----

#[test]
fn test_non_optional_child_is_required() {
    let mut app = nested_app(false);
    app.parse(["command1", "-o", "json"]).unwrap();
    let err = app.validate().unwrap_err();
    assert_eq!(
        err.to_string(),
        "a sub-command is required after 'test command1'; try --help"
    );

    app.parse(["command1", "sub-com"]).unwrap();
    assert_eq!(app.validate().unwrap_err().kind(), ErrorKind::MissingRequiredArg);

    app.parse(["command1", "sub-com", "pods"]).unwrap();
    app.validate().unwrap();
}

#[test]
fn test_optional_child_reports_missing_argument() {
    let err = check(nested_app(true), argv(&["command1", "-o", "json"])).unwrap_err();
    assert!(
        matches!(err, Error::MissingRequiredArg { ref name, .. } if name == "resource-type"),
        "{err:?}"
    );

    let err = check(nested_app(true), argv(&["command1", "sub-com"])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArg);

    check(nested_app(true), argv(&["command1", "sub-com", "pods"])).unwrap();
}

#[test]
fn test_required_arguments_are_checked_before_flags() {
    let mut app = Application::new("app")
        .with_flag(Flag::text("token").with_required(true))
        .with_arg(Arg::text("target").with_required(true));
    app.parse(Vec::<String>::new()).unwrap();
    assert_eq!(app.validate().unwrap_err().kind(), ErrorKind::MissingRequiredArg);

    app.parse(["host"]).unwrap();
    let err = app.validate().unwrap_err();
    assert_eq!(err.to_string(), "required flag --token is missing");

    app.parse(["host", "--token", "t"]).unwrap();
    app.validate().unwrap();
}

#[test]
fn test_default_does_not_satisfy_required() {
    let mut app = Application::new("app")
        .with_flag(Flag::text("region").with_required(true).with_default("eu"));
    app.parse(Vec::<String>::new()).unwrap();
    assert_eq!(app.flag_value("region").unwrap().as_str(), Some("eu"));
    assert_eq!(app.validate().unwrap_err().kind(), ErrorKind::MissingRequiredFlag);
}

// ---- validators ----

#[test]
fn test_validator_can_make_flag_required() {
    let mut app = Application::new("app")
        .with_flag(Flag::bool("remote"))
        .with_flag(Flag::text("host").with_validator(|check, _| {
            let remote = check.app().flag_value("remote")?.as_bool().unwrap_or(false);
            check.set_required(remote);
            Ok(())
        }));

    app.parse(Vec::<String>::new()).unwrap();
    app.validate().unwrap();

    app.parse(["--remote"]).unwrap();
    let err = app.validate().unwrap_err();
    assert!(matches!(err, Error::MissingRequiredFlag { ref name, .. } if name == "host"));
    assert!(app.flag("host").unwrap().is_required());

    app.parse(["--remote", "--host", "db1"]).unwrap();
    app.validate().unwrap();
}

#[test]
fn test_validator_errors_are_wrapped() {
    let mut app = Application::new("app").with_arg(Arg::text("name").with_validator(
        |_, arg| {
            if arg.value().as_str().is_some_and(|v| v.starts_with('_')) {
                return Err("names may not start with an underscore".into());
            }
            Ok(())
        },
    ));
    app.parse(["_x"]).unwrap();
    let err = app.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidatorFailed);
    assert!(err.to_string().contains("underscore"), "{err}");

    app.parse(["x"]).unwrap();
    app.validate().unwrap();
}

#[test]
fn test_command_validators_run_leaf_to_root() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let (root_order, leaf_order) = (order.clone(), order.clone());
    let mut app = Application::new("app")
        .with_validator(move |_, command| {
            root_order.borrow_mut().push(command.name().to_string());
            Ok(())
        })
        .with_subcommand(Command::new("get").with_validator(move |_, command| {
            leaf_order.borrow_mut().push(command.name().to_string());
            Ok(())
        }));
    app.parse(["get"]).unwrap();
    app.validate().unwrap();
    assert_eq!(*order.borrow(), vec!["get", "app"]);
}

#[test]
fn test_framework_error_from_validator_passes_through() {
    let mut app = Application::new("app").with_validator(|check, _| {
        check.app().flag("missing")?;
        Ok(())
    });
    app.parse(Vec::<String>::new()).unwrap();
    let err = app.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownElement);
}
