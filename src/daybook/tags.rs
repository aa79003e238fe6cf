pub const LEDGER_FIELDS: &[&str] = &["LEDGERNAME", "PARTYLEDGERNAME", "NAME", "AMOUNT"];
pub const LEDGER_NAME: &[&str] = &["LEDGERNAME", "PARTYLEDGERNAME", "NAME"];
pub const AMOUNT: &[&str] = &["AMOUNT"];

pub const VOUCHER_ID: &[&str] = &["REMOTEID", "VOUCHERREMOTEID", "GUID", "VCHKEY", "VOUCHERID", "ID", "UUID"];
pub const VOUCHER_TYPE_ATTR: &[&str] = &["VCHTYPE"];
pub const VOUCHER_TYPE: &[&str] = &["VCHTYPE", "VOUCHERTYPE", "TYPE"];
pub const VOUCHER_KEY_ATTR: &[&str] = &["VCHKEY"];
pub const VOUCHER_KEY: &[&str] = &["VCHKEY", "VOUCHERKEY", "KEY"];
pub const DATE: &[&str] = &["DATE", "VOUCHERDATE"];
pub const NARRATION: &[&str] = &["NARRATION"];
pub const VOUCHER_NUMBER: &[&str] = &["VOUCHERNUMBER", "VCHNUM", "VOUCHERNO"];
pub const REFERENCE: &[&str] = &["REFERENCE", "REF"];
pub const PARTY: &[&str] = &["PARTYNAME", "PARTYLEDGERNAME", "PARTYMAILINGNAME"];

pub const STOCK_ITEM: &[&str] = &["STOCKITEMNAME", "STOCKITEM"];
pub const RATE: &[&str] = &["RATE"];
pub const ACTUAL_QTY: &[&str] = &["ACTUALQTY"];
pub const BILLED_QTY: &[&str] = &["BILLEDQTY"];

const VOUCHER_SUFFIX: &str = "VOUCHER";
const LOOSE_VOUCHER_MARKERS: &[&str] = &["DAYBOOK", "DAYBOOKENTRY", "VOUCHER"];

/// Strip a `{namespace}` or `prefix:` qualifier and upper-case the rest.
pub fn normalize_tag(tag: Option<&str>) -> String {
    let Some(tag) = tag else {
        return String::new();
    };

    let local = tag.rsplit_once('}').map_or(tag, |(_, local)| local);
    let local = local.rsplit_once(':').map_or(local, |(_, local)| local);
    local.to_uppercase()
}

/// Whether a normalized name is one of the candidates.
pub fn is_one_of(name: &str, candidates: &[&str]) -> bool {
    candidates.contains(&name)
}

pub fn is_voucher_tag(name: &str) -> bool {
    name.ends_with(VOUCHER_SUFFIX)
}

/// Used only when nothing passes [`is_voucher_tag`].
pub fn is_loose_voucher_tag(name: &str) -> bool {
    LOOSE_VOUCHER_MARKERS.iter().any(|marker| name.contains(marker))
}

/// Elements that hold ledger lines, directly or through their children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    LedgerEntries,
    InventoryEntries,
    AccountingAllocations,
}

impl Container {
    pub fn markers(self) -> &'static [&'static str] {
        match self {
            Container::LedgerEntries => &["LEDGERENTRIES", "ALLLEDGERENTRIES"],
            Container::InventoryEntries => &["ALLINVENTORYENTRIES"],
            Container::AccountingAllocations => &["ACCOUNTINGALLOCATIONS"],
        }
    }

    pub fn matches(self, name: &str) -> bool {
        self.markers().iter().any(|marker| name.contains(marker))
    }
}
