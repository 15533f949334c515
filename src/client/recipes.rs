//! Recipe Client
//!
//! Catalogue listing, search and AI generation, plus the card view used
//! by listings.

use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{ApiClient, ClientResult};

pub const DEFAULT_PAGE_SIZE: u32 = 8;

/// Recipe as stored by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipe {
    pub id: String,
    pub title: String,
    pub short_description: Option<String>,
    pub image_url: Option<String>,
    pub source: Option<String>,
    pub servings: Option<u32>,
    pub calories: Option<u32>,
    pub prep_minutes: Option<u32>,
    pub cook_minutes: Option<u32>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub category: Option<String>,
    pub area: Option<String>,
    pub tags: Option<String>,
    pub instructions: Option<String>,
    pub ingredients_json: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Difficulty {
    Facile,
    Moyen,
    Difficile,
}

impl Difficulty {
    pub fn from_calories(calories: u32) -> Self {
        if calories < 400 {
            Difficulty::Facile
        } else if calories < 700 {
            Difficulty::Moyen
        } else {
            Difficulty::Difficile
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Facile => "Facile",
            Difficulty::Moyen => "Moyen",
            Difficulty::Difficile => "Difficile",
        }
    }
}

/// Listing view of a recipe with display defaults filled in
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeCard {
    pub id: String,
    pub name: String,
    pub image: String,
    pub description: String,
    pub calories: u32,
    /// Preparation plus cooking, in minutes
    pub time: u32,
    pub difficulty: Difficulty,
    pub category: String,
    pub source: String,
    pub prep_minutes: u32,
}

const DEFAULT_CALORIES: u32 = 500;
const DEFAULT_PREP: u32 = 15;
const DEFAULT_COOK: u32 = 20;
const DESCRIPTION_CHARS: usize = 100;

const PLACEHOLDERS: &[(&str, &[&str])] = &[
    (
        "Generated AI",
        &[
            "https://images.unsplash.com/photo-1565299624946-b28f40a0ca4b?w=400&fit=crop",
            "https://images.unsplash.com/photo-1555939594-58056f625634?w=400&fit=crop",
        ],
    ),
    (
        "Main",
        &["https://images.unsplash.com/photo-1504674900247-0877df9cc836?w=400&fit=crop"],
    ),
    (
        "Other",
        &["https://via.placeholder.com/400x300/ff6b6b/ffffff?text=Recette"],
    ),
];

/// Stock image for a category, stable for a given recipe id
pub fn placeholder_image(category: &str, seed: &str) -> &'static str {
    let images = PLACEHOLDERS
        .iter()
        .find(|(name, _)| *name == category)
        .or_else(|| PLACEHOLDERS.iter().find(|(name, _)| *name == "Other"))
        .map(|(_, images)| *images)
        .unwrap_or(&[]);

    if images.is_empty() {
        return "";
    }
    let index = seed.bytes().map(usize::from).sum::<usize>() % images.len();
    images[index]
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl From<&Recipe> for RecipeCard {
    fn from(recipe: &Recipe) -> Self {
        let calories = recipe.calories.filter(|c| *c > 0).unwrap_or(DEFAULT_CALORIES);
        let prep = recipe.prep_minutes.filter(|m| *m > 0).unwrap_or(DEFAULT_PREP);
        let cook = recipe.cook_minutes.filter(|m| *m > 0).unwrap_or(DEFAULT_COOK);
        let category = non_empty(&recipe.category).unwrap_or("Other").to_string();

        let description = non_empty(&recipe.short_description)
            .map(str::to_string)
            .or_else(|| {
                non_empty(&recipe.instructions)
                    .map(|text| text.chars().take(DESCRIPTION_CHARS).collect())
            })
            .unwrap_or_else(|| "Recette délicieuse".to_string());

        let image = non_empty(&recipe.image_url)
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_image(&category, &recipe.id).to_string());

        RecipeCard {
            id: recipe.id.clone(),
            name: recipe.title.clone(),
            image,
            description,
            calories,
            time: prep + cook,
            difficulty: Difficulty::from_calories(calories),
            category,
            source: non_empty(&recipe.source).unwrap_or("Manual").to_string(),
            prep_minutes: prep,
        }
    }
}

/// Client for `<api>/recipes`
pub struct RecipeClient {
    api: ApiClient,
}

impl RecipeClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// One page of the catalogue (pages start at 0)
    pub async fn list(&self, page: u32, size: u32) -> ClientResult<Vec<Recipe>> {
        let request = self
            .api
            .request(Method::GET, "recipes")
            .query(&[("page", page), ("size", size)]);
        self.api.send_json(request).await
    }

    pub async fn get(&self, id: &str) -> ClientResult<Recipe> {
        let path = format!("recipes/{}", urlencoding::encode(id));
        self.api.send_json(self.api.request(Method::GET, &path)).await
    }

    pub async fn categories(&self) -> ClientResult<Vec<String>> {
        self.api
            .send_json(self.api.request(Method::GET, "recipes/categories"))
            .await
    }

    pub async fn search(&self, query: &str, page: u32, size: u32) -> ClientResult<Vec<Recipe>> {
        let request = self.api.request(Method::GET, "recipes/search").query(&[
            ("search", query.to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ]);
        self.api.send_json(request).await
    }

    /// Ask the backend to generate and store a recipe from a prompt
    pub async fn generate_ai(&self, prompt: &str) -> ClientResult<Recipe> {
        tracing::info!(prompt_len = prompt.len(), "Generating AI recipe");
        let request = self
            .api
            .request(Method::POST, "ai/generate-and-save")
            .form(&[("prompt", prompt)]);
        self.api.send_json(request).await
    }
}
