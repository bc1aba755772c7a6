use super::*;

#[test]
fn extracts_inline_data_and_text() {
    let resp = json!({
        "candidates": [{ "content": { "parts": [{ "inlineData": { "mimeType": "audio/pcm", "data": "AAAA" } }] } }]
    });
    assert_eq!(extract_inline_data(&resp).unwrap(), "AAAA");
    assert_eq!(
        extract_text(&resp).unwrap_err().kind,
        BackendErrorKind::InvalidResponse
    );

    let resp = json!({ "candidates": [{ "content": { "parts": [{ "text": "[]" }] } }] });
    assert_eq!(extract_text(&resp).unwrap(), "[]");
    assert!(extract_inline_data(&json!({})).is_err());
}

#[test]
fn image_data_is_found_after_a_leading_text_part() {
    let resp = json!({
        "candidates": [{ "content": { "parts": [
            { "text": "Here is your scene." },
            { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } }
        ] } }]
    });
    assert_eq!(extract_inline_data(&resp).unwrap(), "iVBORw0KGgo=");
    assert_eq!(extract_text(&resp).unwrap(), "Here is your scene.");

    let empty = json!({ "candidates": [{ "content": { "parts": [] } }] });
    assert_eq!(
        extract_inline_data(&empty).unwrap_err().kind,
        BackendErrorKind::InvalidResponse
    );
}

#[test]
fn characters_parse_with_gender_words() {
    let text = r#"```json
[{"name":" Anna ","gender":"Female","description":"red coat"},
 {"name":"Ben","gender":"boy"},
 {"name":"Extra","gender":"?"}]
```"#;
    let cast = parse_characters_json(text, 2).unwrap();
    assert_eq!(cast.len(), 2);
    assert_eq!(cast[0].name, "Anna");
    assert_eq!(cast[0].gender, Gender::Female);
    assert_eq!(cast[1].gender, Gender::Male);
    assert_eq!(cast[1].description, "");

    assert!(parse_characters_json(text, 4).is_err());
    assert!(parse_characters_json("not json", 1).is_err());
}

#[test]
fn script_parses() {
    let lines = parse_script_json(r#"[{"speaker":"Anna","text":"Hello"}]"#).unwrap();
    assert_eq!(
        lines,
        vec![ScriptLine {
            speaker: "Anna".into(),
            text: "Hello".into()
        }]
    );
}
