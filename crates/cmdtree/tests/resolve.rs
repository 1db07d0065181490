use std::io::Write;
use std::sync::Arc;
use std::thread;

use cmdtree::{App, Command, Error, Flag, Result, Scope};

fn run(app: &App, argv: &[&str], env: &[&str]) -> (Result<()>, String) {
    let mut out = Vec::new();
    let res = app.run_with_output(argv.iter().copied(), env.iter().copied(), &mut out);
    (res, String::from_utf8(out).unwrap())
}

fn say(scope: &Scope<'_, '_>, text: String) -> Result<()> {
    writeln!(scope.stdout(), "{text}").map_err(Error::Output)
}

/// Root declares bool `F`, `sub` redeclares it as an int and takes arguments.
fn shadowing_app() -> App {
    App::new(
        Command::new("root")
            .flag(Flag::bool("F", false, ""))
            .command(
                Command::new("sub")
                    .args()
                    .flag(Flag::int("F", 0, ""))
                    .action(|scope| {
                        let root = scope.root();
                        say(
                            scope,
                            format!(
                                "{:?} F={:?} root.F={:?} args={:?}",
                                scope.path(),
                                scope.int("F"),
                                root.bool("F"),
                                scope.args().unwrap_or_default()
                            ),
                        )
                    }),
            ),
    )
    .unwrap()
}

#[test]
fn subcommand_flag_shadows_parent_and_binds_args() {
    let (res, out) = run(&shadowing_app(), &["root", "sub", "--F", "5", "a", "b"], &[]);
    res.unwrap();
    assert_eq!(
        out,
        "[\"root\", \"sub\"] F=Some(5) root.F=Some(false) args=[\"a\", \"b\"]\n"
    );
}

#[test]
fn parent_flag_given_before_subcommand() {
    let (res, out) = run(&shadowing_app(), &["root", "--F", "sub", "x"], &[]);
    res.unwrap();
    assert!(out.contains("F=Some(0) root.F=Some(true) args=[\"x\"]"), "{out}");
}

#[test]
fn bool_flag_does_not_consume_following_token() {
    let app = App::new(
        Command::new("root")
            .args()
            .flag(Flag::bool("flag", false, ""))
            .action(|scope| say(scope, format!("{:?} {:?}", scope.bool("flag"), scope.args()))),
    )
    .unwrap();
    let (res, out) = run(&app, &["root", "--flag", "value"], &[]);
    res.unwrap();
    assert_eq!(out, "Some(true) Some([\"value\"])\n");
}

#[test]
fn optional_value_flag_keeps_following_argument() {
    let app = App::new(
        Command::new("root")
            .args()
            .flag(Flag::string("color", "auto", "").optional_value("always"))
            .action(|scope| say(scope, format!("{:?} {:?}", scope.string("color"), scope.args()))),
    )
    .unwrap();
    let (res, out) = run(&app, &["root", "--color", "file.txt"], &[]);
    res.unwrap();
    assert_eq!(out, "Some(\"always\") Some([\"file.txt\"])\n");

    let (res, out) = run(&app, &["root", "--color=never"], &[]);
    res.unwrap();
    assert_eq!(out, "Some(\"never\") Some([])\n");
}

#[test]
fn missing_value_is_value_required() {
    let app = App::new(Command::new("root").flag(Flag::string("name", "", ""))).unwrap();
    let (res, _) = run(&app, &["root", "--name"], &[]);
    let err = res.unwrap_err();
    assert!(matches!(err.root_cause(), Error::ValueRequired), "{err}");
    assert_eq!(err.to_string(), "root: --name: flag value required");
}

#[test]
fn invalid_values_are_reported_with_breadcrumbs() {
    let app = App::new(
        Command::new("root").command(Command::new("sub").flag(Flag::int("count,c", 0, ""))),
    )
    .unwrap();
    let (res, _) = run(&app, &["root", "sub", "-c", "many"], &[]);
    let err = res.unwrap_err();
    assert!(
        err.to_string().starts_with("root: sub: -c: invalid value \"many\""),
        "{err}"
    );
}

fn local_flag_app() -> App {
    App::new(
        Command::new("root")
            .flag(Flag::string("mode", "", "").local())
            .command(
                Command::new("greet")
                    .flag(Flag::int("greeting,g", -1, "").local())
                    .action(|scope| say(scope, format!("g={:?}", scope.int("g")))),
            )
            .command(Command::new("list").action(|_| Ok(()))),
    )
    .unwrap()
}

#[test]
fn local_flag_resolves_on_its_own_command() {
    let (res, out) = run(&local_flag_app(), &["root", "--mode=x", "greet", "-g", "2"], &[]);
    res.unwrap();
    assert_eq!(out, "g=Some(2)\n");
}

#[test]
fn local_flag_is_invisible_to_siblings_and_children() {
    let app = local_flag_app();

    let (res, _) = run(&app, &["root", "list", "--greeting", "1"], &[]);
    let err = res.unwrap_err();
    assert!(matches!(err.root_cause(), Error::NoSuchFlag(name) if name == "--greeting"), "{err}");

    let (res, _) = run(&app, &["root", "greet", "--mode", "x"], &[]);
    let err = res.unwrap_err();
    assert!(matches!(err.root_cause(), Error::NoSuchFlag(_)), "{err}");
    assert!(err.to_string().starts_with("root: greet: "), "{err}");
}

#[test]
fn terminator_makes_everything_positional() {
    let app = App::new(
        Command::new("root")
            .args()
            .flag(Flag::bool("v", false, ""))
            .command(Command::new("sub"))
            .action(|scope| say(scope, format!("{:?} {:?}", scope.bool("v"), scope.args()))),
    )
    .unwrap();
    let (res, out) = run(&app, &["root", "-v", "--", "--not-a-flag", "sub", "--"], &[]);
    res.unwrap();
    assert_eq!(out, "Some(true) Some([\"--not-a-flag\", \"sub\", \"--\"])\n");
}

#[test]
fn unexpected_positional_errors() {
    let app = App::new(
        Command::new("root")
            .command(Command::new("leaf").action(|_| Ok(()))),
    )
    .unwrap();

    let (res, _) = run(&app, &["root", "leef"], &[]);
    assert!(matches!(res.unwrap_err().root_cause(), Error::NoSuchCommand(t) if t == "leef"));

    let (res, _) = run(&app, &["root", "leaf", "extra"], &[]);
    let err = res.unwrap_err();
    assert!(matches!(err.root_cause(), Error::NoArgumentsExpected(t) if t == "extra"));
    assert!(err.to_string().starts_with("root: leaf: unexpected argument"), "{err}");
}

#[test]
fn aliases_select_commands_and_flags() {
    let app = App::new(
        Command::new("root").command(
            Command::new("delete,del,rm")
                .flag(Flag::bool("force,f", false, ""))
                .action(|scope| say(scope, format!("{} {:?}", scope.command().main_name(), scope.bool("force")))),
        ),
    )
    .unwrap();
    let (res, out) = run(&app, &["root", "rm", "-f"], &[]);
    res.unwrap();
    assert_eq!(out, "delete Some(true)\n");
}

#[test]
fn typed_values_and_lists() {
    let app = App::new(
        Command::new("root")
            .flag(Flag::float("ratio", 1.0, ""))
            .flag(Flag::duration("timeout", std::time::Duration::from_secs(1), ""))
            .flag(Flag::strings("tag,t", ["default"], ""))
            .flag(Flag::custom("port", 80u16, "", |raw: &str| Ok(raw.parse::<u16>()?)))
            .action(|scope| {
                say(
                    scope,
                    format!(
                        "{:?} {:?} {:?} {:?}",
                        scope.float("ratio"),
                        scope.duration("timeout"),
                        scope.strings("tag"),
                        scope.custom::<u16>("port"),
                    ),
                )
            }),
    )
    .unwrap();

    let (res, out) = run(
        &app,
        &["root", "--ratio=0.5", "--timeout", "1m30s", "-t", "a", "--tag=b", "--port", "8080"],
        &[],
    );
    res.unwrap();
    assert_eq!(out, "Some(0.5) Some(90s) Some([\"a\", \"b\"]) Some(8080)\n");

    let (res, out) = run(&app, &["root"], &[]);
    res.unwrap();
    assert_eq!(out, "Some(1.0) Some(1s) Some([\"default\"]) Some(80)\n");
}

#[test]
fn flags_set_and_scope_listing() {
    let app = App::new(
        Command::new("root")
            .flag(Flag::bool("verbose,v", false, ""))
            .flag(Flag::string("secret", "", "").local())
            .command(
                Command::new("sub")
                    .flag(Flag::string("verbose", "", ""))
                    .flag(Flag::int("n", 0, ""))
                    .action(|scope| {
                        let names: Vec<&str> = scope
                            .flags_in_scope()
                            .iter()
                            .map(|f| f.flag().main_name())
                            .collect();
                        say(scope, format!("{names:?} {:?}", scope.flags_set()))
                    }),
            ),
    )
    .unwrap();
    let (res, out) = run(&app, &["root", "-v", "sub", "--n=1"], &[]);
    res.unwrap();
    // Root's `verbose` is still reachable through `-v`.
    assert_eq!(out, "[\"verbose\", \"n\", \"verbose\"] [\"verbose\", \"n\"]\n");
}

#[test]
fn sequential_runs_do_not_share_state() {
    let app = shadowing_app();
    let (res, first) = run(&app, &["root", "--F", "sub", "a"], &[]);
    res.unwrap();
    let (res, second) = run(&app, &["root", "sub"], &[]);
    res.unwrap();
    assert!(first.contains("root.F=Some(true)"), "{first}");
    assert_eq!(
        second,
        "[\"root\", \"sub\"] F=Some(0) root.F=Some(false) args=[]\n"
    );
}

#[test]
fn concurrent_runs_share_one_app() {
    let app = Arc::new(shadowing_app());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let app = Arc::clone(&app);
            thread::spawn(move || {
                let n = i.to_string();
                let (res, out) = run(&app, &["root", "sub", "--F", n.as_str(), n.as_str()], &[]);
                res.unwrap();
                (i, out)
            })
        })
        .collect();

    for handle in handles {
        let (i, out) = handle.join().unwrap();
        assert_eq!(
            out,
            format!("[\"root\", \"sub\"] F=Some({i}) root.F=Some(false) args=[\"{i}\"]\n")
        );
    }
}

#[test]
fn validation_rejects_duplicate_aliases() {
    let err = App::new(
        Command::new("root")
            .flag(Flag::bool("quiet,q", false, ""))
            .flag(Flag::string("query,q", "", "")),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err:?}");
}
