use crate::db::models::Medicine;

/// Medicines picked during the current session. Never persisted.
///
/// The same medicine may appear more than once; each entry is one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<Medicine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, medicine: Medicine) {
        self.items.push(medicine);
    }

    /// Removes the most recently added entry with this id.
    pub fn remove(&mut self, medicine_id: &str) -> Option<Medicine> {
        let index = self.items.iter().rposition(|m| m.id == medicine_id)?;
        Some(self.items.remove(index))
    }

    /// Removes every entry with this id, returning how many there were.
    pub fn remove_all(&mut self, medicine_id: &str) -> usize {
        let before = self.items.len();
        self.items.retain(|m| m.id != medicine_id);
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[Medicine] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(|m| m.price).sum()
    }

    /// Distinct medicines in first-added order, with the number of entries for each.
    pub fn quantities(&self) -> Vec<(Medicine, u32)> {
        let mut grouped: Vec<(Medicine, u32)> = Vec::new();
        for medicine in &self.items {
            match grouped.iter_mut().find(|(m, _)| m.id == medicine.id) {
                Some((_, count)) => *count += 1,
                None => grouped.push((medicine.clone(), 1)),
            }
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medicine(id: &str, price: f64) -> Medicine {
        Medicine::new(format!("Medicine {}", id), "", price, 10, "").with_id(id)
    }

    #[test]
    fn add_then_remove_restores_previous_contents() {
        let mut cart = Cart::new();
        cart.add(medicine("a", 1.0));
        cart.add(medicine("b", 2.0));
        let before = cart.clone();

        cart.add(medicine("a", 1.0));
        assert_eq!(cart.remove("a").map(|m| m.id), Some("a".to_string()));
        assert_eq!(cart, before);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut cart = Cart::new();
        cart.add(medicine("a", 1.0));
        assert!(cart.remove("zzz").is_none());
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn remove_all_drops_every_matching_entry() {
        let mut cart = Cart::new();
        cart.add(medicine("a", 1.0));
        cart.add(medicine("b", 2.0));
        cart.add(medicine("a", 1.0));

        assert_eq!(cart.remove_all("a"), 2);
        assert_eq!(cart.items(), &[medicine("b", 2.0)]);
        assert_eq!(cart.remove_all("a"), 0);
    }

    #[test]
    fn totals_and_groups_entries() {
        let mut cart = Cart::new();
        cart.add(medicine("a", 2.5));
        cart.add(medicine("b", 15.0));
        cart.add(medicine("a", 2.5));

        assert_eq!(cart.total(), 20.0);
        let grouped: Vec<(String, u32)> = cart
            .quantities()
            .into_iter()
            .map(|(m, n)| (m.id, n))
            .collect();
        assert_eq!(grouped, vec![("a".to_string(), 2), ("b".to_string(), 1)]);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), 0.0);
    }
}
