//! Name-based aisle classification and emoji lookup. Nothing here is persisted.

use std::fmt;

use serde::Serialize;

/// Store sections. Lists order them by label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Aisle {
    #[serde(rename = "Fresh Produce")]
    FreshProduce,
    #[serde(rename = "Dairy, Eggs & Fridge")]
    DairyEggsFridge,
    #[serde(rename = "Bakery")]
    Bakery,
    #[serde(rename = "Oils & Vinegars")]
    OilsVinegars,
    #[serde(rename = "Spices & Seasonings")]
    SpicesSeasonings,
    #[serde(rename = "Pasta, Grains & Legumes")]
    PastaGrainsLegumes,
    #[serde(rename = "Frozen")]
    Frozen,
    #[serde(rename = "Pantry")]
    Pantry,
}

const PRODUCE: &[&str] = &[
    "tomato", "spinach", "cilantro", "lettuce", "kale", "arugula", "onion", "garlic", "ginger",
    "potato", "carrot", "pepper", "broccoli", "mushroom", "avocado", "lime", "lemon", "banana",
    "apple", "berry",
];
const DAIRY: &[&str] = &[
    "milk", "cheese", "yogurt", "butter", "cream", "egg", "mozzarella", "cheddar", "parmesan",
];
const BAKERY: &[&str] = &["bread", "bun", "bagel", "tortilla", "wrap", "pita", "naan", "croissant"];
const OILS: &[&str] = &["oil", "canola", "vinegar", "balsamic"];
const SPICES: &[&str] = &[
    "salt", "pepper", "paprika", "cumin", "coriander", "turmeric", "chili", "cayenne", "oregano",
    "basil", "thyme", "rosemary", "garam", "masala", "spice",
];
const GRAINS: &[&str] = &[
    "pasta", "noodle", "rice", "quinoa", "lentil", "bean", "chickpea", "flour", "oat",
];
const FROZEN: &[&str] = &["frozen"];

const RULES: &[(Aisle, &[&str])] = &[
    (Aisle::FreshProduce, PRODUCE),
    (Aisle::DairyEggsFridge, DAIRY),
    (Aisle::Bakery, BAKERY),
    (Aisle::OilsVinegars, OILS),
    (Aisle::SpicesSeasonings, SPICES),
    (Aisle::PastaGrainsLegumes, GRAINS),
    (Aisle::Frozen, FROZEN),
];

impl Aisle {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FreshProduce => "Fresh Produce",
            Self::DairyEggsFridge => "Dairy, Eggs & Fridge",
            Self::Bakery => "Bakery",
            Self::OilsVinegars => "Oils & Vinegars",
            Self::SpicesSeasonings => "Spices & Seasonings",
            Self::PastaGrainsLegumes => "Pasta, Grains & Legumes",
            Self::Frozen => "Frozen",
            Self::Pantry => "Pantry",
        }
    }
}

impl fmt::Display for Aisle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn matches_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| name.contains(k))
}

/// Classify an item by substring keywords. The first matching aisle wins, so
/// "bell pepper" is produce and "rice vinegar" is an oil.
#[must_use]
pub fn classify(name: &str) -> Aisle {
    let lower = name.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| matches_any(&lower, keywords))
        .map_or(Aisle::Pantry, |(aisle, _)| *aisle)
}

pub const FALLBACK_EMOJI: &str = "🍽️";
pub const MANUAL_EMOJI: &str = "📝";

const EXACT_EMOJI: &[(&str, &str)] = &[
    ("salt", "🧂"),
    ("sea salt", "🧂"),
    ("kosher salt", "🧂"),
    ("pepper", "⚫"),
    ("black pepper", "⚫"),
    ("water", "💧"),
    ("ice", "🧊"),
    ("sugar", "🍚"),
    ("brown sugar", "🟫"),
    ("honey", "🍯"),
    ("maple syrup", "🍁"),
    ("flour", "🌾"),
    ("cornstarch", "🌽"),
    ("cocoa powder", "🍫"),
    ("rice", "🍚"),
    ("quinoa", "🌾"),
    ("rolled oats", "🥣"),
    ("baking powder", "🧪"),
    ("baking soda", "🧪"),
    ("yeast", "🦠"),
    ("olive oil", "🫒"),
    ("coconut oil", "🥥"),
    ("butter", "🧈"),
    ("ghee", "🧈"),
    ("milk", "🥛"),
    ("coconut milk", "🥥"),
    ("cream", "🥛"),
    ("cheese", "🧀"),
    ("egg", "🥚"),
    ("eggs", "🥚"),
    ("chicken", "🍗"),
    ("chicken breast", "🍗"),
    ("beef", "🥩"),
    ("ground beef", "🥩"),
    ("bacon", "🥓"),
    ("fish", "🐟"),
    ("shrimp", "🦐"),
    ("tofu", "🧈"),
    ("gnocchi", "🥔"),
    ("bagels", "🥯"),
    ("potato", "🥔"),
    ("sweet potato", "🍠"),
    ("carrot", "🥕"),
    ("tomato", "🍅"),
    ("eggplant", "🍆"),
    ("cucumber", "🥒"),
    ("zucchini", "🥒"),
    ("bell pepper", "🫑"),
    ("broccoli", "🥦"),
    ("cauliflower", "🥦"),
    ("garlic", "🧄"),
    ("corn", "🌽"),
    ("lemon", "🍋"),
    ("lime", "🍋"),
    ("orange", "🍊"),
    ("strawberries", "🍓"),
    ("blueberries", "🫐"),
    ("pineapple", "🍍"),
    ("mango", "🥭"),
    ("banana", "🍌"),
    ("coconut", "🥥"),
    ("avocado", "🥑"),
    ("apple", "🍎"),
    ("pear", "🍐"),
    ("grapes", "🍇"),
    ("peanuts", "🥜"),
    ("peanut butter", "🥜"),
    ("star anise", "⭐"),
    ("bay leaves", "🍃"),
    ("ketchup", "🍅"),
    ("puff pastry", "🥐"),
];

const FAMILY_EMOJI: &[(&[&str], &str)] = &[
    (&["pepper", "chili", "jalapeno", "serrano", "habanero", "chipotle"], "🌶️"),
    (&["onion", "shallot", "leek", "garlic", "chive"], "🧅"),
    (&["leaf", "greens", "lettuce", "spinach", "kale", "arugula", "cabbage", "bok choy", "chard"], "🥬"),
    (&["bean", "lentil", "pea", "chickpea", "edamame", "dal"], "🫘"),
    (&["oil", "fat", "butter", "ghee"], "🛢️"),
    (&["cheese", "dairy", "cream", "yogurt", "milk"], "🧀"),
    (&["flour", "grain", "wheat", "rice", "oats", "couscous", "bulgur", "polenta"], "🌾"),
    (&["fruit", "berry", "apple", "orange", "lemon", "lime"], "🍎"),
    (&["vegetable", "veg", "carrot", "potato", "tomato"], "🥕"),
    (&["herb", "basil", "parsley", "cilantro", "mint", "oregano", "thyme", "rosemary"], "🌿"),
    (&["spice", "cumin", "coriander", "turmeric", "paprika", "cinnamon"], "🧪"),
    (&["nut", "almond", "cashew", "walnut", "pecan", "pistachio", "peanut"], "🌰"),
    (&["seed", "sesame", "pumpkin", "sunflower", "chia", "flax"], "🌻"),
    (&["mushroom", "fungi"], "🍄"),
    (&["pasta", "noodle", "spaghetti", "penne", "fusilli", "macaroni", "udon", "soba", "ramen"], "🍝"),
    (&["bread", "naan", "pita", "tortilla", "bagel", "muffin", "crust"], "🍞"),
    (&["sauce", "paste", "dressing", "marinade", "condiment"], "🍶"),
    (&["sweet", "sugar", "honey", "maple", "syrup", "candy"], "🍯"),
    (&["salt", "seasoning", "powder"], "🧂"),
];

/// Pick an emoji for an ingredient: a stored emoji wins, then an exact name
/// match, then a keyword family, then a neutral plate.
#[must_use]
pub fn resolve_emoji<'a>(name: &str, stored: Option<&'a str>) -> &'a str {
    if let Some(emoji) = stored.filter(|e| !e.trim().is_empty()) {
        return emoji;
    }
    let lower = name.trim().to_lowercase();
    if let Some((_, emoji)) = EXACT_EMOJI.iter().find(|(n, _)| *n == lower) {
        return *emoji;
    }
    FAMILY_EMOJI
        .iter()
        .find(|(keywords, _)| matches_any(&lower, keywords))
        .map_or(FALLBACK_EMOJI, |(_, emoji)| *emoji)
}
