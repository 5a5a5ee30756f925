//! Invoice editor state and the totals math behind it.

use serde::Serialize;

/// One invoice row. `amount` is always `quantity * rate` and is recomputed on
/// every quantity/rate edit; it is never edited directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub id: u64,
    pub name: String,
    pub quantity: f64,
    pub rate: f64,
    pub amount: f64,
}

impl LineItem {
    /// A line item is submittable once it has a real name and positive
    /// quantity and rate.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && self.quantity > 0.0 && self.rate > 0.0
    }
}

/// Derived totals shown live in the editor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total: f64,
}

/// Pure totals computation over whatever rows are currently present,
/// including rows that would later fail submission validation.
pub fn totals(items: &[LineItem], tax_percentage: f64) -> Totals {
    let subtotal: f64 = items.iter().map(|i| i.amount).sum();
    let tax_amount = subtotal * tax_percentage / 100.0;
    Totals {
        subtotal,
        tax_amount,
        total: subtotal + tax_amount,
    }
}

/// Invoice payload built at submit time from the valid subset of rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceData {
    pub description: String,
    pub items: Vec<LineItem>,
    pub tax_percentage: f64,
    pub subtotal: f64,
    pub tax_amount: f64,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Editable invoice panel state for one completion session.
#[derive(Debug, Clone)]
pub struct InvoiceEditor {
    pub description: String,
    pub items: Vec<LineItem>,
    pub tax_percentage: f64,
    pub notes: String,
    next_id: u64,
}

impl InvoiceEditor {
    /// Open the panel with one blank row; the editor never shows zero rows.
    pub fn new() -> Self {
        let mut editor = Self {
            description: String::new(),
            items: Vec::new(),
            tax_percentage: 0.0,
            notes: String::new(),
            next_id: 1,
        };
        editor.add_line_item();
        editor
    }

    /// Append a fresh row: empty name, quantity 1, rate 0, amount 0.
    pub fn add_line_item(&mut self) {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(LineItem {
            id,
            name: String::new(),
            quantity: 1.0,
            rate: 0.0,
            amount: 0.0,
        });
    }

    /// Remove a row by id, refusing to drop below one remaining row.
    pub fn remove_line_item(&mut self, id: u64) {
        if self.items.len() > 1 {
            self.items.retain(|i| i.id != id);
        }
    }

    pub fn set_name(&mut self, id: u64, name: String) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.name = name;
        }
    }

    /// Update a quantity and recompute that row's amount.
    pub fn set_quantity(&mut self, id: u64, quantity: f64) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.quantity = quantity;
            item.amount = item.quantity * item.rate;
        }
    }

    /// Update a rate and recompute that row's amount.
    pub fn set_rate(&mut self, id: u64, rate: f64) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.rate = rate;
            item.amount = item.quantity * item.rate;
        }
    }

    /// Live totals over all rows as shown in the panel.
    pub fn totals(&self) -> Totals {
        totals(&self.items, self.tax_percentage)
    }

    /// The subset of rows that will actually be submitted.
    pub fn valid_items(&self) -> Vec<LineItem> {
        self.items.iter().filter(|i| i.is_valid()).cloned().collect()
    }

    /// Build the submit-time payload. Invalid rows are silently dropped from
    /// the payload but stay editable in the panel; totals are recomputed over
    /// the surviving rows.
    pub fn build_invoice_data(&self) -> InvoiceData {
        let items = self.valid_items();
        let t = totals(&items, self.tax_percentage);
        InvoiceData {
            description: self.description.trim().to_string(),
            items,
            tax_percentage: self.tax_percentage,
            subtotal: t.subtotal,
            tax_amount: t.tax_amount,
            total: t.total,
            notes: if self.notes.trim().is_empty() {
                None
            } else {
                Some(self.notes.clone())
            },
        }
    }
}

impl Default for InvoiceEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn item(id: u64, name: &str, quantity: f64, rate: f64) -> LineItem {
        LineItem {
            id,
            name: name.into(),
            quantity,
            rate,
            amount: quantity * rate,
        }
    }

    #[test]
    fn test_totals_invariant() {
        let items = vec![item(1, "Filter", 2.0, 15.0), item(2, "Belt", 3.0, 7.5)];
        let t = totals(&items, 10.0);
        assert!((t.subtotal - 52.5).abs() < EPS);
        assert!((t.tax_amount - 5.25).abs() < EPS);
        assert!((t.total - 57.75).abs() < EPS);
    }

    #[test]
    fn test_editing_one_row_leaves_others_alone() {
        let mut editor = InvoiceEditor::new();
        editor.add_line_item();
        let (a, b) = (editor.items[0].id, editor.items[1].id);
        editor.set_quantity(a, 4.0);
        editor.set_rate(a, 2.5);
        let untouched = editor.items[1].amount;
        editor.set_rate(b, 9.0);
        assert!((editor.items[0].amount - 10.0).abs() < EPS);
        assert!((editor.items[1].amount - 9.0).abs() < EPS);
        // The edit to row b did not alter row a, and vice versa.
        assert!((untouched - 0.0).abs() < EPS);
    }

    #[test]
    fn test_remove_never_drops_below_one() {
        let mut editor = InvoiceEditor::new();
        let only = editor.items[0].id;
        editor.remove_line_item(only);
        assert_eq!(editor.items.len(), 1);
        editor.add_line_item();
        editor.remove_line_item(only);
        assert_eq!(editor.items.len(), 1);
        assert_ne!(editor.items[0].id, only);
    }

    #[test]
    fn test_fresh_row_contributes_zero() {
        let mut editor = InvoiceEditor::new();
        editor.add_line_item();
        let t = editor.totals();
        assert!((t.subtotal - 0.0).abs() < EPS);
        assert!((t.total - 0.0).abs() < EPS);
    }

    #[test]
    fn test_invalid_rows_dropped_from_payload_only() {
        let mut editor = InvoiceEditor::new();
        let first = editor.items[0].id;
        editor.set_name(first, "Filter".into());
        editor.set_quantity(first, 2.0);
        editor.set_rate(first, 15.0);
        // Second row keeps the defaults: empty name, qty 1, rate 0.
        editor.add_line_item();
        editor.tax_percentage = 10.0;

        let data = editor.build_invoice_data();
        assert_eq!(data.items.len(), 1);
        assert_eq!(data.items[0].name, "Filter");
        assert!((data.subtotal - 30.0).abs() < EPS);
        assert!((data.tax_amount - 3.0).abs() < EPS);
        assert!((data.total - 33.0).abs() < EPS);
        // The editor itself still shows both rows.
        assert_eq!(editor.items.len(), 2);
    }

    #[test]
    fn test_invoice_data_serializes_camel_case() {
        let mut editor = InvoiceEditor::new();
        let id = editor.items[0].id;
        editor.description = "Repair".into();
        editor.set_name(id, "Filter".into());
        editor.set_rate(id, 15.0);
        let json: serde_json::Value =
            serde_json::to_value(editor.build_invoice_data()).unwrap();
        assert!(json.get("taxPercentage").is_some());
        assert!(json.get("taxAmount").is_some());
        assert!(json.get("notes").is_none());
    }
}
