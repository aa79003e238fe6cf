use std::collections::HashSet;
use std::iter;

use log::debug;

use super::fields::{normalize_amount, reformat_date};
use super::tags::{self, is_one_of, normalize_tag, Container};
use super::tree::{Document, Node, NodeId};

/// Find voucher elements anywhere in the document, in document order.
///
/// Elements named `VOUCHER` (or ending in it) win. Only when there are none
/// does a looser scan for daybook/voucher-ish names run.
pub fn locate_vouchers(doc: &Document) -> Vec<Node<'_>> {
    let vouchers: Vec<_> = doc
        .root()
        .descendants()
        .filter(|node| tags::is_voucher_tag(&name_of(node)))
        .collect();

    if !vouchers.is_empty() {
        return vouchers;
    }

    debug!("no VOUCHER elements, falling back to loose voucher scan");
    doc.root()
        .descendants()
        .filter(|node| tags::is_loose_voucher_tag(&name_of(node)))
        .collect()
}

/// One ledger line of a voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation<'doc> {
    /// Element carrying the ledger name and amount.
    pub node: Node<'doc>,
    /// Inventory line the allocation belongs to, if any.
    pub item: Option<Node<'doc>>,
}

/// Gather every ledger line of a voucher.
///
/// Each element is reported at most once, but separate elements are never
/// merged, even when they name the same ledger with the same amount.
pub fn collect_allocations<'doc>(voucher: Node<'doc>) -> Vec<Allocation<'doc>> {
    let mut collector = Collector::default();

    for child in voucher.children() {
        if Container::LedgerEntries.matches(&name_of(&child)) {
            collector.record_lines(child, None);
        }
    }

    for child in voucher.children() {
        if !Container::InventoryEntries.matches(&name_of(&child)) {
            continue;
        }
        // Tally writes the item fields on the container itself; some exports
        // nest one element per item below it instead.
        for item in iter::once(child).chain(child.children()) {
            for sub in item.children() {
                if Container::AccountingAllocations.matches(&name_of(&sub)) {
                    collector.record_lines(sub, Some(item));
                }
            }
        }
    }

    collector.entries
}

#[derive(Default)]
struct Collector<'doc> {
    seen: HashSet<NodeId>,
    entries: Vec<Allocation<'doc>>,
}

impl<'doc> Collector<'doc> {
    /// Record `container` as a line, or else each of its children that is one.
    fn record_lines(&mut self, container: Node<'doc>, item: Option<Node<'doc>>) {
        if has_ledger_field(container) {
            self.record(container, item);
            return;
        }

        for sub in container.children() {
            if has_ledger_field(sub) {
                self.record(sub, item);
            }
        }
    }

    fn record(&mut self, node: Node<'doc>, item: Option<Node<'doc>>) {
        if self.seen.insert(node.id()) {
            self.entries.push(Allocation { node, item });
        }
    }
}

fn has_ledger_field(node: Node<'_>) -> bool {
    node.children().any(|c| is_one_of(&name_of(&c), tags::LEDGER_FIELDS))
}

fn name_of(node: &Node<'_>) -> String {
    normalize_tag(Some(node.tag()))
}

/// Trimmed text of the first direct child with a matching name.
pub fn child_text(node: Node<'_>, candidates: &[&str]) -> Option<String> {
    node.children()
        .find(|c| is_one_of(&name_of(c), candidates))
        .map(|c| c.text().trim().to_owned())
}

/// Trimmed text of the first matching element in the subtree, `node` included.
pub fn descendant_text(node: Node<'_>, candidates: &[&str]) -> Option<String> {
    node.descendants()
        .find(|c| is_one_of(&name_of(c), candidates))
        .map(|c| c.text().trim().to_owned())
}

/// First non-empty attribute of `node` with a matching name.
pub fn attribute_value(node: Node<'_>, candidates: &[&str]) -> Option<String> {
    node.attributes()
        .find(|&(name, value)| !value.is_empty() && is_one_of(&normalize_tag(Some(name)), candidates))
        .map(|(_, value)| value.to_owned())
}

/// A flattened output line. Item columns stay blank for plain ledger lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    pub voucher_id: String,
    pub vch_type: String,
    pub vch_key: String,
    pub date: String,
    pub voucher_number: String,
    pub reference: String,
    pub party_name: String,
    pub gl_account: String,
    pub stock_item_name: String,
    pub rate: String,
    pub actual_qty: String,
    pub billed_qty: String,
    pub amount: String,
    pub narration: String,
}

/// Voucher-level values repeated on every row of the voucher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoucherFields {
    pub id: String,
    pub vch_type: String,
    pub vch_key: String,
    pub date: String,
    pub number: String,
    pub reference: String,
    pub party_name: String,
    pub narration: String,
}

impl VoucherFields {
    pub fn extract(voucher: Node<'_>) -> VoucherFields {
        let id = child_text(voucher, tags::VOUCHER_ID)
            .filter(|v| !v.is_empty())
            .or_else(|| descendant_text(voucher, tags::VOUCHER_ID).filter(|v| !v.is_empty()))
            .or_else(|| attribute_value(voucher, tags::VOUCHER_ID));

        let vch_type = attribute_value(voucher, tags::VOUCHER_TYPE_ATTR)
            .or_else(|| child_text(voucher, tags::VOUCHER_TYPE).filter(|v| !v.is_empty()))
            .or_else(|| descendant_text(voucher, tags::VOUCHER_TYPE).filter(|v| !v.is_empty()));

        let vch_key = attribute_value(voucher, tags::VOUCHER_KEY_ATTR)
            .or_else(|| child_text(voucher, tags::VOUCHER_KEY).filter(|v| !v.is_empty()))
            .or_else(|| descendant_text(voucher, tags::VOUCHER_KEY).filter(|v| !v.is_empty()));

        let narration = child_text(voucher, tags::NARRATION)
            .map(|n| n.replace("\r\n", " ").replace(['\r', '\n'], " ").trim().to_owned());

        VoucherFields {
            id: id.unwrap_or_default(),
            vch_type: vch_type.unwrap_or_default(),
            vch_key: vch_key.unwrap_or_default(),
            date: child_text(voucher, tags::DATE)
                .map(|d| reformat_date(&d))
                .unwrap_or_default(),
            number: child_text(voucher, tags::VOUCHER_NUMBER).unwrap_or_default(),
            reference: child_text(voucher, tags::REFERENCE).unwrap_or_default(),
            party_name: child_text(voucher, tags::PARTY).unwrap_or_default(),
            narration: narration.unwrap_or_default(),
        }
    }

    /// Row for an allocation, or `None` when it names neither ledger nor amount.
    pub fn allocation_row(&self, allocation: &Allocation<'_>) -> Option<CsvRow> {
        let gl_account = child_text(allocation.node, tags::LEDGER_NAME).unwrap_or_default();
        let mut amount = amount_of(allocation.node);
        if amount.is_empty() {
            if let Some(item) = allocation.item {
                amount = amount_of(item);
            }
        }

        if gl_account.is_empty() && amount.is_empty() {
            debug!("skipping empty allocation, voucher={}, node={:?}", self.id, allocation.node);
            return None;
        }

        let item_text = |candidates: &[&str]| {
            allocation
                .item
                .and_then(|item| child_text(item, candidates))
                .unwrap_or_default()
        };

        Some(CsvRow {
            stock_item_name: item_text(tags::STOCK_ITEM),
            rate: item_text(tags::RATE),
            actual_qty: item_text(tags::ACTUAL_QTY),
            billed_qty: item_text(tags::BILLED_QTY),
            ..self.row(gl_account, amount)
        })
    }

    /// The single row of a voucher without allocations, from its own
    /// ledger and amount children when present.
    pub fn fallback_row(&self, voucher: Node<'_>) -> CsvRow {
        let gl_account = child_text(voucher, tags::LEDGER_NAME).unwrap_or_default();
        self.row(gl_account, amount_of(voucher))
    }

    fn row(&self, gl_account: String, amount: String) -> CsvRow {
        CsvRow {
            voucher_id: self.id.clone(),
            vch_type: self.vch_type.clone(),
            vch_key: self.vch_key.clone(),
            date: self.date.clone(),
            voucher_number: self.number.clone(),
            reference: self.reference.clone(),
            party_name: self.party_name.clone(),
            gl_account,
            amount,
            narration: self.narration.clone(),
            ..CsvRow::default()
        }
    }
}

fn amount_of(node: Node<'_>) -> String {
    child_text(node, tags::AMOUNT)
        .map(|a| normalize_amount(&a))
        .unwrap_or_default()
}
