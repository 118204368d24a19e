use serde_json::json;
use survey_expr::{ExpressionEngine, Scalar};

/// Engine loaded with the variable set used throughout these tests.
fn engine() -> ExpressionEngine {
    let mut engine = ExpressionEngine::new();
    engine
        .register_variables_from_json(&json!({
            "one": 1, "two": 2, "three": 3, "four": 4, "five": 5, "six": 6,
            "seven": 7, "eight": 8, "nine": 9, "ten": 10, "eleven": 11,
            "twelve": 12, "half": 0.5, "hi": "there", "hello": "Tom",
            "12X34X56": 5, "12X3X5lab1_ber": 10,
            "q5pointChoice.code": 5, "q5pointChoice.value": "Father",
            "numKids": 2, "name": "Sergei", "age": 45
        }))
        .unwrap();
    engine
}

fn eval(engine: &mut ExpressionEngine, source: &str) -> String {
    assert!(
        engine.evaluate(source, false),
        "{source:?} failed: {}",
        engine.readable_errors()
    );
    engine.result_text().expect("result after success")
}

#[test]
fn evaluates_sgqa_identifiers() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "12X34X56 * 12X3X5lab1_ber"), "50");
}

#[test]
fn evaluates_dotted_words() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "q5pointChoice.code"), "5");
    assert_eq!(eval(&mut engine, "q5pointChoice.value"), "Father");
}

#[test]
fn variadic_min_max() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "max(one, two, three, four, five)"), "5");
    assert_eq!(eval(&mut engine, "min(four, five, six)"), "4");
}

#[test]
fn pi_identity() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "pi() == pi() * 2 - pi()"), "1");
}

#[test]
fn if_selects_branch_by_truthiness() {
    let mut engine = engine();
    assert_eq!(
        eval(&mut engine, "if((numKids==1),'child','children')"),
        "children"
    );
    assert_eq!(eval(&mut engine, "if((numKids==2),'ok','no')"), "ok");
}

#[test]
fn list_builds_comma_separated_values() {
    let mut engine = engine();
    assert_eq!(
        eval(
            &mut engine,
            "list(one,two,three,min(four,five,six),max(three,four,five))"
        ),
        "1, 2, 3, 4, 5"
    );
}

#[test]
fn arithmetic_precedence_and_unary() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "one + two * three"), "7");
    assert_eq!(eval(&mut engine, "(one + two) * three"), "9");
    assert_eq!(eval(&mut engine, "-(one + two)"), "-3");
    assert_eq!(eval(&mut engine, "twelve / two / three"), "2");
    assert_eq!(eval(&mut engine, "half + half"), "1");
    assert_eq!(eval(&mut engine, "!one"), "0");
    assert_eq!(eval(&mut engine, "!(one - one)"), "1");
}

#[test]
fn comparators_symbolic_and_keyword() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "one < two"), "1");
    assert_eq!(eval(&mut engine, "one lt two"), "1");
    assert_eq!(eval(&mut engine, "two LE two"), "1");
    assert_eq!(eval(&mut engine, "three ge four"), "0");
    assert_eq!(eval(&mut engine, "two eq two"), "1");
    assert_eq!(eval(&mut engine, "two ne two"), "0");
    assert_eq!(eval(&mut engine, "hi == 'there'"), "1");
}

#[test]
fn loose_equality_between_text_and_numbers() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "'5' == 12X34X56"), "1");
    assert_eq!(eval(&mut engine, "'5.0' == 12X34X56"), "1");
    assert_eq!(eval(&mut engine, "'Father' == q5pointChoice.value"), "1");
    assert_eq!(eval(&mut engine, "'father' == q5pointChoice.value"), "0");
}

#[test]
fn logical_operators_return_zero_or_one() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "one and two"), "1");
    assert_eq!(eval(&mut engine, "one && (two - two)"), "0");
    assert_eq!(eval(&mut engine, "(one - one) || (two - two)"), "0");
    assert_eq!(eval(&mut engine, "one or (two - two)"), "1");
    assert_eq!(eval(&mut engine, "one or two and (one - one)"), "1");
}

#[test]
fn plus_concatenates_when_not_numeric() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "hello + ' ' + hi"), "Tom there");
    assert_eq!(eval(&mut engine, "'age ' + age"), "age 45");
    assert_eq!(eval(&mut engine, "'5' + five"), "10");
}

#[test]
fn comma_list_keeps_the_last_value() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "(one, two, three)"), "3");
}

#[test]
fn assignment_round_trip() {
    let mut engine = engine();
    engine.register_variables([("x".to_string(), Scalar::Number(0.0))]);

    assert_eq!(eval(&mut engine, "x = twelve / three"), "4");
    assert_eq!(engine.variable("x"), Some(&Scalar::Number(4.0)));
    assert_eq!(eval(&mut engine, "x"), "4");

    assert_eq!(eval(&mut engine, "x += one"), "5");
    assert_eq!(eval(&mut engine, "x -= two"), "3");
    assert_eq!(eval(&mut engine, "x *= four"), "12");
    assert_eq!(eval(&mut engine, "x /= two"), "6");
    assert_eq!(engine.variable("x"), Some(&Scalar::Number(6.0)));
}

#[test]
fn assignment_to_reserved_word_fails() {
    let mut engine = engine();
    engine.register_reserved([("TOKEN:EMAIL".to_string(), Scalar::from("a@b.c"))]);

    assert!(engine.evaluate("TOKEN:EMAIL", false));
    assert!(!engine.evaluate("TOKEN:EMAIL = 'x'", false));
    assert!(engine
        .readable_errors()
        .contains("reserved word 'TOKEN:EMAIL' cannot be assigned"));
}

#[test]
fn assignment_to_unknown_name_fails() {
    let mut engine = engine();
    assert!(!engine.evaluate("mystery = 1", false));
    assert!(engine
        .readable_errors()
        .contains("undefined variable 'mystery'"));
}

#[test]
fn unbalanced_parentheses_are_reported() {
    let mut engine = engine();
    assert!(!engine.evaluate("(one * two + (three - four)", false));
    assert!(engine.result().is_none());
    assert!(engine
        .errors()
        .iter()
        .any(|d| d.message.contains("unbalanced parentheses")));
}

#[test]
fn increment_is_unsupported_syntax_at_offset_zero() {
    let mut engine = engine();
    engine.register_variables([("a".to_string(), Scalar::Number(1.0))]);
    assert!(!engine.evaluate("++a", false));
    let diagnostic = &engine.errors()[0];
    assert!(diagnostic.message.contains("unsupported syntax"));
    assert_eq!(diagnostic.token.as_ref().map(|t| t.offset), Some(0));
}

#[test]
fn division_by_zero_is_a_reported_error() {
    let mut engine = engine();
    assert!(!engine.evaluate("one / (two - two)", false));
    assert!(engine.readable_errors().contains("division by zero"));
}

#[test]
fn unknown_function_and_wrong_arity() {
    let mut engine = engine();
    assert!(!engine.evaluate("mystery(one)", false));
    assert!(engine
        .readable_errors()
        .contains("undefined function 'mystery'"));

    assert!(!engine.evaluate("pi(one)", false));
    assert!(engine
        .readable_errors()
        .contains("wrong number of arguments for 'pi'"));

    assert!(!engine.evaluate("pow(two)", false));
    assert!(engine
        .readable_errors()
        .contains("wrong number of arguments"));
}

#[test]
fn trailing_tokens_are_rejected() {
    let mut engine = engine();
    assert!(!engine.evaluate("one two", false));
    assert!(engine
        .errors()
        .iter()
        .any(|d| d.message.contains("extra tokens")));
}

#[test]
fn registry_isolation_in_used_name_lists() {
    let mut engine = engine();
    engine.register_reserved([("TOKEN:FIRSTNAME".to_string(), Scalar::from("Ann"))]);

    assert!(engine.evaluate("one + TOKEN:FIRSTNAME", false));
    assert_eq!(engine.vars_used(), vec!["one"]);
    assert_eq!(engine.reserved_used(), vec!["TOKEN:FIRSTNAME"]);
    assert!(!engine.vars_used().contains(&"TOKEN:FIRSTNAME".to_string()));
}

#[test]
fn parse_only_matches_normal_mode() {
    let sources = [
        "one + two * three",
        "if((numKids==1),'child','children')",
        "list(one, hi, max(two, three))",
        "12X34X56 * 12X3X5lab1_ber",
        "hi == 'there' and one lt two",
    ];

    for source in sources {
        let mut normal = engine();
        let mut parse_only = engine();

        assert!(normal.evaluate(source, false), "{source:?}");
        assert!(parse_only.evaluate(source, true), "{source:?}");
        assert!(parse_only.errors().is_empty(), "{source:?}");
        assert_eq!(normal.vars_used(), parse_only.vars_used(), "{source:?}");
        assert_eq!(
            normal.reserved_used(),
            parse_only.reserved_used(),
            "{source:?}"
        );
    }
}

#[test]
fn parse_only_has_no_side_effects() {
    let mut engine = engine();
    engine.register_variables([("x".to_string(), Scalar::Number(7.0))]);
    assert!(engine.evaluate("x = 99", true));
    assert_eq!(engine.variable("x"), Some(&Scalar::Number(7.0)));
}

#[test]
fn parse_only_still_checks_names_and_arity() {
    let mut engine = engine();
    assert!(!engine.evaluate("one + missing", true));
    assert!(!engine.evaluate("pi(one)", true));
}

#[test]
fn string_escapes_and_quoting_forms() {
    let mut engine = engine();
    assert_eq!(
        eval(&mut engine, r#""don't" + ' say "hi"'"#),
        r#"don't say "hi""#
    );
    assert_eq!(eval(&mut engine, r#"'it\'s'"#), "it's");
}

#[test]
fn builtin_string_functions_compose() {
    let mut engine = engine();
    assert_eq!(eval(&mut engine, "strtoupper(hi)"), "THERE");
    assert_eq!(eval(&mut engine, "strlen(hello)"), "3");
    assert_eq!(eval(&mut engine, "substr(hi, one, three)"), "her");
    assert_eq!(
        eval(&mut engine, "ucwords(join(hello, ' ', hi))"),
        "Tom There"
    );
    assert_eq!(eval(&mut engine, "number_format(sum(1000, 234))"), "1,234");
}
