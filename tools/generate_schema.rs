//! JSON Schema + Markdown生成ツール
//!
//! src/domain/config.rsの設定構造から以下を自動生成します：
//! 1. JSON Schema (schema/config.json)
//! 2. Markdownドキュメント (CONFIGURATION.md)
//!
//! 実行方法:
//! ```
//! cargo run --bin generate_schema
//! ```

use camengine::domain::config::AppConfig;
use schemars::schema_for;
use serde_json::Value;
use std::fs;

fn main() {
    println!("JSON Schema + Markdown生成中...");

    // AppConfigからJSON Schemaを生成
    let schema = schema_for!(AppConfig);

    let json = serde_json::to_string_pretty(&schema).expect("Failed to serialize schema to JSON");

    fs::create_dir_all("schema").expect("Failed to create schema/ directory");
    fs::write("schema/config.json", &json).expect("Failed to write schema/config.json");
    println!("  ✓ schema/config.json");

    let schema_value: Value = serde_json::from_str(&json).expect("Failed to parse generated schema");
    let markdown = generate_markdown(&schema_value);

    fs::write("CONFIGURATION.md", markdown).expect("Failed to write CONFIGURATION.md");
    println!("  ✓ CONFIGURATION.md");

    println!("✅ 生成完了: schema/config.json + CONFIGURATION.md");
}

/// JSON Schemaからマークダウンドキュメントを生成
fn generate_markdown(schema: &Value) -> String {
    let mut md = String::new();

    md.push_str("# 設定リファレンス (Configuration Reference)\n\n");
    md.push_str("`config.toml` で指定できる設定の一覧です。");
    md.push_str("このファイルは `cargo run --bin generate_schema` で自動生成されます。\n\n");

    // ルートのプロパティ（セクション）
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (section, prop) in properties {
            md.push_str(&format!("## [{}]\n\n", section));
            if let Some(desc) = description_of(prop) {
                md.push_str(&format!("{}\n\n", desc));
            }

            if let Some(def) = resolve(schema, prop) {
                render_fields(&mut md, schema, def);
            }
        }
    }

    md
}

/// セクション内のフィールドをテーブルとして出力
fn render_fields(md: &mut String, schema: &Value, def: &Value) {
    let Some(properties) = def.get("properties").and_then(Value::as_object) else {
        return;
    };

    md.push_str("| フィールド | 型 | 説明 |\n");
    md.push_str("|---|---|---|\n");

    for (name, prop) in properties {
        let resolved = resolve(schema, prop).unwrap_or(prop);
        let type_name = type_of(resolved);
        let description = description_of(prop)
            .or_else(|| description_of(resolved))
            .unwrap_or_default()
            .replace('\n', " ");
        md.push_str(&format!("| `{}` | {} | {} |\n", name, type_name, description));
    }
    md.push('\n');
}

/// `$ref` を `$defs` から解決する
fn resolve<'a>(schema: &'a Value, prop: &'a Value) -> Option<&'a Value> {
    let reference = prop.get("$ref")?.as_str()?;
    let name = reference.strip_prefix("#/$defs/")?;
    schema.get("$defs")?.get(name)
}

fn description_of(prop: &Value) -> Option<String> {
    prop.get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn type_of(prop: &Value) -> String {
    if let Some(t) = prop.get("type") {
        match t {
            Value::String(s) => s.clone(),
            Value::Array(list) => list
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" | "),
            _ => "object".to_string(),
        }
    } else if prop.get("enum").is_some() {
        "enum".to_string()
    } else {
        "object".to_string()
    }
}
