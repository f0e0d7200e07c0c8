//! Read-only queries over the mirrored catalog and sales history.

use crate::db::models::{Medicine, Sale};

/// Medicines whose name contains `search` and whose category equals `category`,
/// both compared case-insensitively. A blank search or a `None` category matches everything.
pub fn filter_medicines<'a>(
    medicines: &'a [Medicine],
    search: &str,
    category: Option<&str>,
) -> Vec<&'a Medicine> {
    let search = search.trim().to_lowercase();
    let category = category.map(|c| c.trim().to_lowercase());

    medicines
        .iter()
        .filter(|m| search.is_empty() || m.name.to_lowercase().contains(&search))
        .filter(|m| {
            category
                .as_deref()
                .map_or(true, |c| m.category.trim().to_lowercase() == c)
        })
        .collect()
}

/// Distinct, non-blank categories in the order they first appear.
pub fn categories(medicines: &[Medicine]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for medicine in medicines {
        let category = medicine.category.trim();
        if category.is_empty() {
            continue;
        }
        if !seen.iter().any(|c| c.eq_ignore_ascii_case(category)) {
            seen.push(category.to_string());
        }
    }
    seen
}

pub fn find_medicine<'a>(medicines: &'a [Medicine], id: &str) -> Option<&'a Medicine> {
    medicines.iter().find(|m| m.id == id)
}

pub fn sales_for_medicine<'a>(sales: &'a [Sale], medicine_id: &str) -> Vec<&'a Sale> {
    sales.iter().filter(|s| s.medicine_id == medicine_id).collect()
}

pub fn low_stock(medicines: &[Medicine], threshold: i32) -> Vec<&Medicine> {
    medicines.iter().filter(|m| m.stock <= threshold).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Buyer;

    fn catalog() -> Vec<Medicine> {
        vec![
            Medicine::new("Paracetamol", "Pain reliever", 2.5, 100, "Pain Relief").with_id("1"),
            Medicine::new("Amoxicillin", "Antibiotic", 15.0, 5, "Antibiotics").with_id("2"),
            Medicine::new("Ibuprofen", "Anti-inflammatory", 5.0, 75, "pain relief").with_id("3"),
            Medicine::new("Vitamin C", "Supplement", 4.0, 0, "").with_id("4"),
        ]
    }

    fn ids(list: &[&Medicine]) -> Vec<String> {
        list.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn filters_by_name_and_category() {
        let medicines = catalog();
        assert_eq!(filter_medicines(&medicines, "", None).len(), 4);
        assert_eq!(ids(&filter_medicines(&medicines, "PROFEN", None)), vec!["3"]);
        assert_eq!(
            ids(&filter_medicines(&medicines, " ", Some("Pain Relief"))),
            vec!["1", "3"]
        );
        assert_eq!(
            ids(&filter_medicines(&medicines, "para", Some("pain relief"))),
            vec!["1"]
        );
        assert!(filter_medicines(&medicines, "amox", Some("Pain Relief")).is_empty());
    }

    #[test]
    fn lists_distinct_categories() {
        assert_eq!(categories(&catalog()), vec!["Pain Relief", "Antibiotics"]);
    }

    #[test]
    fn find_medicine_returns_none_for_unknown_id() {
        let medicines = catalog();
        assert_eq!(find_medicine(&medicines, "2").map(|m| m.name.as_str()), Some("Amoxicillin"));
        assert!(find_medicine(&medicines, "non-existent").is_none());
    }

    #[test]
    fn selects_sales_and_low_stock() {
        let buyer = Buyer::new("Jane", "Street 1", "555");
        let sales = vec![
            Sale::new("med1", 2, &buyer),
            Sale::new("med1", 1, &buyer),
            Sale::new("med2", 3, &buyer),
        ];
        let for_med1 = sales_for_medicine(&sales, "med1");
        assert_eq!(for_med1.len(), 2);
        assert!(for_med1.iter().all(|s| s.medicine_id == "med1"));

        assert_eq!(ids(&low_stock(&catalog(), 5)), vec!["2", "4"]);
    }
}
