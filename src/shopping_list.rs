use crate::domain::IngredientTotal;
use chrono::NaiveDateTime;

/// Plain-text shopping list: cart recipes followed by numbered ingredient totals.
pub fn render(generated_at: NaiveDateTime, recipes: &[String], products: &[IngredientTotal]) -> String {
    let mut lines = vec![
        format!(
            "SHOPPING LIST (as of {})",
            generated_at.format("%H:%M:%S %d.%m.%Y")
        ),
        String::new(),
        "Recipes:".to_string(),
    ];
    lines.extend(recipes.iter().map(|name| format!("* {name}")));
    lines.push(String::new());
    lines.push("Products:".to_string());
    lines.extend(products.iter().enumerate().map(|(index, product)| {
        format!(
            "{}. {} {} - {}",
            index + 1,
            product.total_amount,
            product.measurement_unit,
            product.name
        )
    }));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn renders_sections_and_numbering() {
        let at = NaiveDate::from_ymd_opt(2024, 2, 13)
            .unwrap()
            .and_hms_opt(13, 53, 7)
            .unwrap();
        let text = render(
            at,
            &["Pancakes".to_string(), "Bread".to_string()],
            &[
                IngredientTotal { name: "egg".into(), measurement_unit: "pcs".into(), total_amount: 2 },
                IngredientTotal { name: "flour".into(), measurement_unit: "g".into(), total_amount: 700 },
            ],
        );
        assert_eq!(
            text,
            "SHOPPING LIST (as of 13:53:07 13.02.2024)\n\
             \n\
             Recipes:\n\
             * Pancakes\n\
             * Bread\n\
             \n\
             Products:\n\
             1. 2 pcs - egg\n\
             2. 700 g - flour"
        );
    }

    #[test]
    fn empty_cart_still_has_headings() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let text = render(at, &[], &[]);
        assert!(text.ends_with("Recipes:\n\nProducts:"));
    }
}
