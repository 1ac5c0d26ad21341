//! Add-recipe form: a short prompt sequence that becomes a `NewRecipe`.

use recipe_browser::catalog::{ImageUpload, NewRecipe, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Description,
    Cover,
    Gallery,
}

impl DraftField {
    pub fn label(self) -> &'static str {
        match self {
            DraftField::Title => "title",
            DraftField::Description => "description",
            DraftField::Cover => "cover image path",
            DraftField::Gallery => "gallery image paths (comma separated)",
        }
    }

    /// None after the last field.
    pub fn next(self) -> Option<DraftField> {
        match self {
            DraftField::Title => Some(DraftField::Description),
            DraftField::Description => Some(DraftField::Cover),
            DraftField::Cover => Some(DraftField::Gallery),
            DraftField::Gallery => None,
        }
    }
}

impl From<ValidationError> for DraftField {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::MissingTitle => DraftField::Title,
            ValidationError::MissingDescription => DraftField::Description,
            ValidationError::MissingCoverImage => DraftField::Cover,
            ValidationError::MissingGalleryImage => DraftField::Gallery,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub cover_path: String,
    pub gallery_paths: String,
}

impl Draft {
    pub fn field_mut(&mut self, field: DraftField) -> &mut String {
        match field {
            DraftField::Title => &mut self.title,
            DraftField::Description => &mut self.description,
            DraftField::Cover => &mut self.cover_path,
            DraftField::Gallery => &mut self.gallery_paths,
        }
    }

    pub fn field(&self, field: DraftField) -> &str {
        match field {
            DraftField::Title => &self.title,
            DraftField::Description => &self.description,
            DraftField::Cover => &self.cover_path,
            DraftField::Gallery => &self.gallery_paths,
        }
    }

    fn gallery(&self) -> impl Iterator<Item = &str> {
        self.gallery_paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Read the image files and build the recipe. Blank paths stay empty so
    /// validation reports them; unreadable files name the field to fix.
    pub async fn to_recipe(&self) -> Result<NewRecipe, (DraftField, String)> {
        let cover_image = match self.cover_path.trim() {
            "" => None,
            path => Some(
                ImageUpload::from_path(path)
                    .await
                    .map_err(|e| (DraftField::Cover, format!("Cannot read {path}: {e}")))?,
            ),
        };
        let mut gallery_images = Vec::new();
        for path in self.gallery() {
            let image = ImageUpload::from_path(path)
                .await
                .map_err(|e| (DraftField::Gallery, format!("Cannot read {path}: {e}")))?;
            gallery_images.push(image);
        }

        Ok(NewRecipe {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            cover_image,
            gallery_images,
            ..NewRecipe::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_run_in_form_order() {
        let mut field = DraftField::Title;
        let mut seen = vec![field];
        while let Some(next) = field.next() {
            seen.push(next);
            field = next;
        }
        assert_eq!(
            seen,
            [DraftField::Title, DraftField::Description, DraftField::Cover, DraftField::Gallery]
        );
    }

    #[tokio::test]
    async fn images_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cover = dir.path().join("cover.jpg");
        let g1 = dir.path().join("g1.png");
        std::fs::write(&cover, b"cover").unwrap();
        std::fs::write(&g1, b"g1").unwrap();

        let draft = Draft {
            title: " Soup ".into(),
            description: "Hot".into(),
            cover_path: cover.display().to_string(),
            gallery_paths: format!(" {} , ", g1.display()),
        };
        let recipe = draft.to_recipe().await.unwrap();
        assert_eq!(recipe.title, "Soup");
        assert_eq!(recipe.cover_image.unwrap().mime, "image/jpeg");
        assert_eq!(recipe.gallery_images.len(), 1);
        assert_eq!(recipe.gallery_images[0].bytes, b"g1");
    }

    #[tokio::test]
    async fn missing_file_points_at_its_field() {
        let draft = Draft {
            cover_path: "/definitely/not/here.jpg".into(),
            ..Draft::default()
        };
        let (field, message) = draft.to_recipe().await.unwrap_err();
        assert_eq!(field, DraftField::Cover);
        assert!(message.starts_with("Cannot read /definitely/not/here.jpg"));
    }
}
