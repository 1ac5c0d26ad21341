//! Recipe data: the read/submit facade over the content service and the
//! bundled sample dataset it falls back to.

pub mod sample;
pub mod search;
pub mod source;
pub mod submit;

pub use source::{CreatedRecipe, RecipeSource, SubmitOutcome};
pub use submit::{ImageUpload, NewIngredient, NewInstruction, NewRecipe, ValidationError};
