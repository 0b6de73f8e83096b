// build.rs
//
// Generates the `t!` translation macro from the TOML files under `locales/`.
// The macro resolves keys at compile time, so a missing key is a build error
// rather than a runtime surprise.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    let lang = env::var("PYRUN_LANG").unwrap_or_else(|_| "en".to_string());
    println!("cargo:rerun-if-env-changed=PYRUN_LANG");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=locales/");

    // English is always loaded first as the fallback; a specific language
    // file only overrides the keys it defines.
    let fallback = fs::read_to_string("locales/en.toml")
        .expect("Failed to read fallback language file: locales/en.toml");
    let mut translations: HashMap<String, String> =
        toml::from_str(&fallback).expect("Failed to parse locales/en.toml");

    if lang != "en" {
        let lang_file = format!("locales/{}.toml", lang);
        match fs::read_to_string(&lang_file) {
            Ok(content) => {
                let overrides: HashMap<String, String> = toml::from_str(&content)
                    .unwrap_or_else(|_| panic!("Failed to parse {}", lang_file));
                translations.extend(overrides);
            }
            Err(_) => println!(
                "cargo:warning=Language file '{}' not found. Falling back to 'en'.",
                lang_file
            ),
        }
    }

    let mut macro_code = String::from("#[macro_export]\nmacro_rules! t {\n");
    for (key, value) in &translations {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        macro_code.push_str(&format!("    (\"{}\") => {{ \"{}\" }};\n", key, escaped));
    }
    macro_code.push_str(
        "    ($key:expr) => {{ compile_error!(concat!(\"Missing translation key: \", $key)) }};\n",
    );
    macro_code.push('}');

    let out_dir = env::var("OUT_DIR").unwrap();
    fs::write(Path::new(&out_dir).join("translations.rs"), macro_code).unwrap();
}
