//! Flattening of content-service responses into `Recipe` / `Category`.
//!
//! The service wraps entities in different envelopes depending on version:
//! a flat object, `{ id, attributes: {...} }`, or either of those under a
//! `data` key. All shapes go through the same functions and produce the same
//! output. Missing fields fall back to defaults; nothing here fails.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::types::{Category, Difficulty, Ingredient, Instruction, Recipe};

/// Peel a `data` envelope holding a single object.
fn unwrap_data(v: &Value) -> &Value {
    match v.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => v,
    }
}

/// Fields of an entity: `attributes` when present, else the object itself.
fn attrs(v: &Value) -> &Value {
    v.get("attributes").filter(|a| a.is_object()).unwrap_or(v)
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// Numbers and strings both count as ids.
fn id_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers or numeric strings; anything else is `default`.
fn number_field(v: &Value, key: &str, default: u32) -> u32 {
    match v.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .map_or(default, |n| n.min(u64::from(u32::MAX)) as u32),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

fn text_field(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn absolute(url: &str, base_url: Option<&str>) -> String {
    if url.is_empty() || url.starts_with("http") {
        return url.to_string();
    }
    match base_url {
        Some(base) => format!("{base}{url}"),
        None => url.to_string(),
    }
}

/// Items of a relation: `{ data: [...] }`, `{ data: {...} }`, a bare array or a
/// single object.
fn relation_items(v: &Value) -> Vec<&Value> {
    let inner = v.get("data").unwrap_or(v);
    match inner {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![inner],
        _ => Vec::new(),
    }
}

fn format_url<'a>(media: &'a Value, format: &str) -> Option<&'a str> {
    media
        .get("formats")
        .and_then(|f| f.get(format))
        .and_then(|f| str_field(f, "url"))
        .filter(|u| !u.is_empty())
}

fn cover_url(field: Option<&Value>, base_url: Option<&str>) -> String {
    let Some(field) = field else {
        return String::new();
    };
    let media = attrs(unwrap_data(field));
    let url = format_url(media, "medium")
        .or_else(|| format_url(media, "small"))
        .or_else(|| str_field(media, "url"))
        .unwrap_or("");
    absolute(url, base_url)
}

fn media_urls(field: &Value, base_url: Option<&str>) -> Vec<String> {
    if let Value::String(url) = field {
        return vec![absolute(url, base_url)];
    }
    relation_items(field)
        .into_iter()
        .filter_map(|item| {
            let m = attrs(item);
            str_field(m, "url")
                .filter(|u| !u.is_empty())
                .or_else(|| format_url(m, "medium"))
                .or_else(|| format_url(m, "small"))
        })
        .map(|u| absolute(u, base_url))
        .filter(|u| !u.is_empty())
        .collect()
}

/// Every non-cover field whose name mentions gallery or image, deduplicated
/// in order of appearance, without the cover itself.
fn gallery_urls(fields: &Map<String, Value>, cover: &str, base_url: Option<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (key, value) in fields {
        if key == "coverImage" {
            continue;
        }
        let lower = key.to_lowercase();
        if !lower.contains("gallery") && !lower.contains("image") {
            continue;
        }
        for url in media_urls(value, base_url) {
            if url != cover && seen.insert(url.clone()) {
                out.push(url);
            }
        }
    }
    out
}

fn tags(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn ingredients(v: Option<&Value>) -> Vec<Ingredient> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .map(|(idx, ing)| Ingredient {
            id: id_string(ing.get("id")).unwrap_or_else(|| idx.to_string()),
            item: text_field(ing, "item"),
            quantity: text_field(ing, "quantity"),
            unit: text_field(ing, "unit"),
            notes: text_field(ing, "notes"),
        })
        .collect()
}

fn instructions(v: Option<&Value>) -> Vec<Instruction> {
    let Some(Value::Array(items)) = v else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .map(|(idx, ins)| Instruction {
            id: id_string(ins.get("id")).unwrap_or_else(|| idx.to_string()),
            step_number: number_field(ins, "stepNumber", idx as u32 + 1),
            description: text_field(ins, "description"),
            tips: str_field(ins, "tips").map(str::to_string),
        })
        .collect()
}

/// Flatten a category entity (flat or enveloped).
pub fn flatten_category(item: &Value) -> Category {
    let entity = unwrap_data(item);
    let a = attrs(entity);
    let id = id_string(entity.get("id"))
        .or_else(|| id_string(a.get("documentId")))
        .unwrap_or_default();
    Category {
        name: str_field(a, "name").unwrap_or("Unknown").to_string(),
        slug: str_field(a, "slug")
            .map(str::to_string)
            .unwrap_or_else(|| format!("cat-{id}")),
        id,
    }
}

/// Flatten a recipe entity (flat or enveloped). Relative media URLs get
/// `base_url` prepended.
pub fn flatten_recipe(item: &Value, base_url: Option<&str>) -> Recipe {
    let entity = unwrap_data(item);
    let a = attrs(entity);
    let empty = Map::new();
    let fields = a.as_object().unwrap_or(&empty);

    let id = id_string(entity.get("id"))
        .or_else(|| id_string(a.get("documentId")))
        .unwrap_or_default();
    let cover_image = cover_url(a.get("coverImage"), base_url);

    Recipe {
        slug: str_field(a, "slug")
            .map(str::to_string)
            .unwrap_or_else(|| id.clone()),
        title: str_field(a, "title").unwrap_or("Untitled").to_string(),
        description: text_field(a, "description"),
        gallery_images: gallery_urls(fields, &cover_image, base_url),
        cover_image,
        ingredients: ingredients(a.get("ingredients")),
        instructions: instructions(a.get("instructions")),
        prep_time: number_field(a, "prepTime", 0),
        cook_time: number_field(a, "cookTime", 0),
        servings: number_field(a, "servings", 1),
        difficulty: str_field(a, "difficulty")
            .and_then(Difficulty::parse)
            .unwrap_or_default(),
        categories: a
            .get("categories")
            .map(|c| relation_items(c).into_iter().map(flatten_category).collect())
            .unwrap_or_default(),
        tags: tags(a.get("tags")),
        created_at: str_field(a, "createdAt").map(str::to_string),
        updated_at: str_field(a, "updatedAt").map(str::to_string),
        id,
    }
}

/// Rows of a list response (`{ data: [...] }`); anything else is empty.
pub fn list_rows(body: &Value) -> &[Value] {
    body.get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
