//! New-recipe submission: form model, client-side validation and the
//! multipart body sent to the content service.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use thiserror::Error;

use crate::error::Result;
use crate::types::Difficulty;

/// Rejections raised before any request is made. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title is required")]
    MissingTitle,
    #[error("Description is required")]
    MissingDescription,
    #[error("A cover image is required")]
    MissingCoverImage,
    #[error("At least one gallery image is required")]
    MissingGalleryImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        Self {
            mime: mime_for(&file_name).to_string(),
            file_name,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }

    fn part(&self) -> Result<Part> {
        Ok(Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(&self.mime)?)
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewIngredient {
    pub item: String,
    pub quantity: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unit: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewInstruction {
    pub description: String,
    pub tips: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstructionPayload<'a> {
    step_number: usize,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tips: Option<&'a str>,
}

/// The `data` field of the multipart body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecipePayload<'a> {
    title: &'a str,
    description: &'a str,
    prep_time: u32,
    cook_time: u32,
    servings: u32,
    difficulty: Difficulty,
    ingredients: &'a [NewIngredient],
    instructions: Vec<InstructionPayload<'a>>,
    category_slugs: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub title: String,
    pub description: String,
    pub prep_time: u32,
    pub cook_time: u32,
    pub servings: u32,
    pub difficulty: Difficulty,
    pub ingredients: Vec<NewIngredient>,
    pub instructions: Vec<NewInstruction>,
    pub category_slugs: Vec<String>,
    pub cover_image: Option<ImageUpload>,
    pub gallery_images: Vec<ImageUpload>,
}

impl Default for NewRecipe {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            prep_time: 0,
            cook_time: 0,
            servings: 1,
            difficulty: Difficulty::default(),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            category_slugs: Vec::new(),
            cover_image: None,
            gallery_images: Vec::new(),
        }
    }
}

impl NewRecipe {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingDescription);
        }
        if self.cover_image.is_none() {
            return Err(ValidationError::MissingCoverImage);
        }
        if self.gallery_images.is_empty() {
            return Err(ValidationError::MissingGalleryImage);
        }
        Ok(())
    }

    /// JSON of the `data` field. Steps are numbered by position from 1.
    pub fn data_json(&self) -> Result<String> {
        let payload = RecipePayload {
            title: &self.title,
            description: &self.description,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            difficulty: self.difficulty,
            ingredients: &self.ingredients,
            instructions: self
                .instructions
                .iter()
                .enumerate()
                .map(|(i, ins)| InstructionPayload {
                    step_number: i + 1,
                    description: &ins.description,
                    tips: ins.tips.as_deref(),
                })
                .collect(),
            category_slugs: &self.category_slugs,
        };
        Ok(serde_json::to_string(&payload)?)
    }

    /// Validate, then build the multipart body: `data`, one `coverImage`
    /// and a `galleryImage` part per gallery file.
    pub fn to_multipart(&self) -> Result<Form> {
        self.validate()?;
        let mut form = Form::new().text("data", self.data_json()?);
        if let Some(cover) = &self.cover_image {
            form = form.part("coverImage", cover.part()?);
        }
        for image in &self.gallery_images {
            form = form.part("galleryImage", image.part()?);
        }
        Ok(form)
    }
}
