// tests/template_properties.rs

use std::path::PathBuf;

use proptest::prelude::*;
use livebuild::template::{DocumentPaths, ScriptTemplate};

const PLACEHOLDERS: [&str; 4] = ["{filepath}", "{filename}", "{fileext}", "{dirpath}"];

fn paths(file_path: &str, file_name: &str, file_ext: &str, dir_path: &str) -> DocumentPaths {
    DocumentPaths {
        file_path: PathBuf::from(file_path),
        file_name: file_name.to_string(),
        file_ext: file_ext.to_string(),
        dir_path: PathBuf::from(dir_path),
    }
}

fn value_for(paths: &DocumentPaths, placeholder: &str) -> String {
    match placeholder {
        "{filepath}" => paths.file_path.to_string_lossy().into_owned(),
        "{filename}" => paths.file_name.clone(),
        "{fileext}" => paths.file_ext.clone(),
        _ => paths.dir_path.to_string_lossy().into_owned(),
    }
}

/// Plain find-and-replace, one placeholder after another in `order`.
fn replace_in_order(template: &str, paths: &DocumentPaths, order: &[usize]) -> String {
    let mut out = template.to_string();
    for &i in order {
        out = out.replace(PLACEHOLDERS[i], &value_for(paths, PLACEHOLDERS[i]));
    }
    out
}

/// Template made of brace-free literal text and placeholders.
fn template_strategy() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[a-z0-9 ./;_-]{0,8}",
        (0..4usize).prop_map(|i| PLACEHOLDERS[i].to_string()),
    ];
    proptest::collection::vec(piece, 0..12).prop_map(|pieces| pieces.concat())
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ./_-]{0,12}"
}

proptest! {
    #[test]
    fn substitution_is_order_independent(
        template in template_strategy(),
        file_path in value_strategy(),
        file_name in value_strategy(),
        file_ext in value_strategy(),
        dir_path in value_strategy(),
        order in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
    ) {
        let paths = paths(&file_path, &file_name, &file_ext, &dir_path);
        let rendered = ScriptTemplate::new(template.clone()).render(&paths);

        prop_assert_eq!(&rendered, &replace_in_order(&template, &paths, &order));
        prop_assert_eq!(&rendered, &replace_in_order(&template, &paths, &[3, 2, 1, 0]));
    }

    #[test]
    fn values_that_look_like_placeholders_are_emitted_literally(
        prefix in "[a-z ]{0,6}",
        which in 0..4usize,
    ) {
        let tricky = PLACEHOLDERS[which];
        let paths = paths("/d/p.tex", tricky, "tex", "/d");
        let rendered = ScriptTemplate::new(format!("{prefix}{{filename}}")).render(&paths);

        prop_assert_eq!(rendered, format!("{prefix}{tricky}"));
    }
}
