use crate::ai::GeneratedRecipe;
use crate::models::{NewIngredient, NewMeal};

/// Split a free-text ingredient line into quantity, unit and name.
///
/// The first token is the quantity. The second token is the unit only when
/// at least three tokens are present; everything after that is the name.
/// Never fails: odd input just lands in odd fields.
#[must_use]
pub fn parse_ingredient_line(line: &str) -> NewIngredient {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let quantity = tokens
        .first()
        .and_then(|token| leading_number(token))
        .filter(|q| *q > 0.0)
        .unwrap_or(1.0);
    let (unit, name_tokens) = if tokens.len() > 2 {
        (tokens[1].to_string(), &tokens[2..])
    } else {
        (String::new(), tokens.get(1..).unwrap_or_default())
    };
    NewIngredient {
        name: name_tokens.join(" "),
        quantity,
        unit,
    }
}

/// The longest prefix of `token` that reads as a decimal number, so `200g`
/// gives 200 and `1/2` gives 1.
fn leading_number(token: &str) -> Option<f64> {
    let end = token
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E')))
        .map_or(token.len(), |(i, _)| i);
    let candidate = &token[..end];
    (1..=candidate.len())
        .rev()
        .find_map(|len| candidate[..len].parse::<f64>().ok())
        .filter(|q| q.is_finite())
}

impl GeneratedRecipe {
    /// A single-serving meal with zero macros and parsed ingredient lines.
    #[must_use]
    pub fn to_new_meal(&self) -> NewMeal {
        NewMeal {
            name: self.meal_name.clone(),
            servings: 1,
            ingredients: self
                .ingredients
                .iter()
                .map(|line| parse_ingredient_line(line))
                .collect(),
            calories_per_serving: 0.0,
            protein_per_serving: 0.0,
            carbs_per_serving: 0.0,
            fat_per_serving: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> (f64, String, String) {
        let i = parse_ingredient_line(line);
        (i.quantity, i.unit, i.name)
    }

    #[test]
    fn test_quantity_unit_name() {
        assert_eq!(
            parsed("2 cups chopped broccoli"),
            (2.0, "cups".to_string(), "chopped broccoli".to_string())
        );
    }

    #[test]
    fn test_two_tokens_have_no_unit() {
        assert_eq!(parsed("3 eggs"), (3.0, String::new(), "eggs".to_string()));
    }

    #[test]
    fn test_single_token() {
        assert_eq!(parsed("salt"), (1.0, String::new(), String::new()));
        assert_eq!(parsed("4"), (4.0, String::new(), String::new()));
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(parsed(""), (1.0, String::new(), String::new()));
        assert_eq!(parsed("   "), (1.0, String::new(), String::new()));
    }

    #[test]
    fn test_unparseable_quantity_defaults_to_one() {
        assert_eq!(
            parsed("Pinch of salt"),
            (1.0, "of".to_string(), "salt".to_string())
        );
    }

    #[test]
    fn test_leading_numeric_prefix() {
        assert_eq!(
            parsed("200g chicken breast"),
            (200.0, "chicken".to_string(), "breast".to_string())
        );
        assert_eq!(parsed("1/2 cup oats").0, 1.0);
        assert_eq!(parsed("1.5 tbsp olive oil").0, 1.5);
        assert_eq!(parsed(".5 tsp pepper").0, 0.5);
        assert_eq!(parsed("1e x y").0, 1.0);
    }

    #[test]
    fn test_zero_or_negative_quantity_defaults_to_one() {
        assert_eq!(parsed("0 cups water").0, 1.0);
        assert_eq!(parsed("-2 cups water").0, 1.0);
    }

    #[test]
    fn test_extra_whitespace_collapses() {
        assert_eq!(
            parsed("  1   cup    brown   rice "),
            (1.0, "cup".to_string(), "brown rice".to_string())
        );
    }

    #[test]
    fn test_recipe_to_new_meal() {
        let recipe = GeneratedRecipe {
            meal_name: "Garlic Rice".to_string(),
            description: "Simple.".to_string(),
            ingredients: vec!["1 cup rice".to_string(), "2 cloves garlic".to_string()],
            instructions: vec!["Cook.".to_string()],
        };
        let meal = recipe.to_new_meal();
        assert_eq!(meal.name, "Garlic Rice");
        assert_eq!(meal.servings, 1);
        assert_eq!(meal.ingredients.len(), 2);
        assert_eq!(meal.ingredients[1].unit, "cloves");
        assert!(meal.calories_per_serving.abs() < f64::EPSILON);
    }
}
