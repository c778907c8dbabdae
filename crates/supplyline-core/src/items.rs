//! Normalized records decoded from supplier payload rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use supplyline_warehouse::{ItemTable, UpsertRow};

use crate::error::MalformedRow;
use crate::fields::{self, get};

/// Supplier number to internal `supplier_item_id`, for available catalog items.
pub type Catalog = BTreeMap<String, i64>;

const PRICE_MAX: f64 = 999_999.99;
const MEYER_PRICE_MAX: f64 = 999_999.9999;
const DIMENSION_MAX: f64 = 999_999.99;
const QUANTITY_MAX: i64 = 16_777_215;
const ITEM_NUMBER_MAX_LEN: usize = 266;

/// Premier warehouse codes and the column holding their available quantity.
pub const PREMIER_WAREHOUSES: [(&str, &str); 8] = [
    ("UT-1-US", "qty_ut_1_us"),
    ("KY-1-US", "qty_ky_1_us"),
    ("TX-1-US", "qty_tx_1_us"),
    ("CA-1-US", "qty_ca_1_us"),
    ("AB-1-CA", "qty_ab_1_ca"),
    ("WA-1-US", "qty_wa_1_us"),
    ("CO-1-US", "qty_co_1_us"),
    ("PO-1-CA", "qty_po_1_ca"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizedItem {
    MeyerItemInformation(MeyerItemInformation),
    PremierPricing(PremierPricing),
    PremierInventory(PremierInventory),
    Turn14Item(Turn14Item),
    Turn14ItemData(Turn14ItemData),
}

impl NormalizedItem {
    /// Stable identity used for idempotent writes.
    pub fn natural_key(&self) -> String {
        match self {
            Self::MeyerItemInformation(item) => {
                format!("{}:{}", ItemTable::MeyerItem, item.supplier_item_id)
            }
            Self::PremierPricing(PremierPricing {
                supplier_item_id, ..
            })
            | Self::PremierInventory(PremierInventory {
                supplier_item_id, ..
            }) => format!("{}:{supplier_item_id}", ItemTable::PremierItem),
            Self::Turn14Item(item) => format!("{}:{}", ItemTable::Turn14Item, item.supplier_item_id),
            Self::Turn14ItemData(item) => format!("turn14_item_data:{}", item.item_id_in_api),
        }
    }

    /// Rows for the idempotent `insert_or_update` contract.
    pub fn upsert_rows(&self) -> Vec<UpsertRow> {
        match self {
            Self::MeyerItemInformation(item) => vec![item.upsert_row()],
            Self::PremierPricing(item) => vec![item.upsert_row()],
            Self::PremierInventory(item) => vec![item.upsert_row()],
            Self::Turn14Item(item) => vec![item.upsert_row()],
            Self::Turn14ItemData(item) => item.upsert_rows(),
        }
    }
}

/// Meyer `ItemInformation` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeyerItemInformation {
    pub supplier_item_id: i64,
    pub item_number: String,
    pub customer_price: Option<f64>,
    pub jobber_price: Option<f64>,
    pub map: Option<f64>,
    pub suggested_retail_price: Option<f64>,
    pub description: Option<String>,
    pub upc: Option<String>,
    pub height: Option<f64>,
    pub length: Option<f64>,
    pub weight: Option<f64>,
    pub width: Option<f64>,
    pub qty_available: Option<i64>,
    pub discontinued: Option<bool>,
    pub kit: Option<bool>,
    pub kit_only: Option<bool>,
    pub ltl_required: Option<bool>,
    pub oversize: Option<bool>,
    pub additional_handling_charge: Option<bool>,
}

impl MeyerItemInformation {
    pub fn from_row(row: &Value, catalog: &Catalog) -> Result<Self, MalformedRow> {
        let item_number =
            fields::required_text(get(row, "ItemNumber"), "ItemNumber", ITEM_NUMBER_MAX_LEN)?;
        let supplier_item_id = lookup(catalog, &item_number, "ItemNumber")?;

        let price = |name: &'static str| fields::number(get(row, name), name, 0.0, MEYER_PRICE_MAX);
        let dimension = |name: &'static str| fields::number(get(row, name), name, 0.0, DIMENSION_MAX);

        Ok(Self {
            supplier_item_id,
            item_number,
            customer_price: price("CustomerPrice"),
            jobber_price: price("JobberPrice"),
            map: price("MinAdvertisedPrice"),
            suggested_retail_price: price("SuggestedRetailPrice"),
            description: fields::text(get(row, "ItemDescription"), "ItemDescription", 5000),
            upc: fields::text(get(row, "UPC"), "UPC", 100),
            height: dimension("Height"),
            length: dimension("Length"),
            weight: dimension("Weight"),
            width: dimension("Width"),
            qty_available: fields::integer(get(row, "QtyAvailable"), "QtyAvailable", 0, QUANTITY_MAX),
            discontinued: match get(row, "PartStatus").and_then(Value::as_str) {
                Some("Discontinued") => Some(true),
                Some("Active") => Some(false),
                _ => None,
            },
            kit: fields::yes_no(get(row, "Kit")),
            kit_only: fields::yes_no(get(row, "Kit Only")),
            ltl_required: fields::yes_no(get(row, "LTL Required")),
            oversize: fields::yes_no(get(row, "Oversize")),
            additional_handling_charge: fields::yes_no(get(row, "Additional Handling Charge")),
        })
    }

    fn upsert_row(&self) -> UpsertRow {
        UpsertRow::new(ItemTable::MeyerItem)
            .with_key("supplier_item_id", self.supplier_item_id)
            .with_field("customer_price", self.customer_price)
            .with_field("jobber_price", self.jobber_price)
            .with_field("map", self.map)
            .with_field("suggested_retail_price", self.suggested_retail_price)
            .with_field("description", self.description.clone())
            .with_field("upc", self.upc.clone())
            .with_field("height", self.height)
            .with_field("length", self.length)
            .with_field("weight", self.weight)
            .with_field("width", self.width)
            .with_field("qty_available", self.qty_available)
            .with_field("discontinued", self.discontinued)
            .with_field("kit", self.kit)
            .with_field("kit_only", self.kit_only)
            .with_field("ltl_required", self.ltl_required)
            .with_field("oversize", self.oversize)
            .with_field("additional_handling_charge", self.additional_handling_charge)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceSet {
    pub cost: Option<f64>,
    pub jobber: Option<f64>,
    pub map: Option<f64>,
    pub retail: Option<f64>,
}

impl PriceSet {
    fn from_entry(entry: &Value) -> Self {
        let price = |name: &'static str| fields::number(get(entry, name), name, 0.0, PRICE_MAX);
        Self {
            cost: price("cost"),
            jobber: price("jobber"),
            map: price("map"),
            retail: price("retail"),
        }
    }
}

/// Premier `pricing` row: one price set per currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremierPricing {
    pub supplier_item_id: i64,
    pub item_number: String,
    pub usd: PriceSet,
    pub cad: PriceSet,
}

impl PremierPricing {
    pub fn from_row(row: &Value, catalog: &Catalog) -> Result<Self, MalformedRow> {
        let item_number =
            fields::required_text(get(row, "itemNumber"), "itemNumber", ITEM_NUMBER_MAX_LEN)?;
        let supplier_item_id = lookup(catalog, &item_number, "itemNumber")?;

        let mut usd = PriceSet::default();
        let mut cad = PriceSet::default();
        for entry in entries(row, "pricing") {
            match get(entry, "currency").and_then(Value::as_str) {
                Some("USD") => usd = PriceSet::from_entry(entry),
                Some("CAD") => cad = PriceSet::from_entry(entry),
                _ => {}
            }
        }

        Ok(Self {
            supplier_item_id,
            item_number,
            usd,
            cad,
        })
    }

    fn upsert_row(&self) -> UpsertRow {
        UpsertRow::new(ItemTable::PremierItem)
            .with_key("supplier_item_id", self.supplier_item_id)
            .with_field("cost_usd", self.usd.cost)
            .with_field("jobber_usd", self.usd.jobber)
            .with_field("map_usd", self.usd.map)
            .with_field("retail_usd", self.usd.retail)
            .with_field("cost_cad", self.cad.cost)
            .with_field("jobber_cad", self.cad.jobber)
            .with_field("map_cad", self.cad.map)
            .with_field("retail_cad", self.cad.retail)
    }
}

/// Premier `inventory` row: available quantity per known warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PremierInventory {
    pub supplier_item_id: i64,
    pub item_number: String,
    /// Keyed by warehouse code; warehouses missing from the response are absent.
    pub quantities: BTreeMap<String, i64>,
}

impl PremierInventory {
    pub fn from_row(row: &Value, catalog: &Catalog) -> Result<Self, MalformedRow> {
        let item_number =
            fields::required_text(get(row, "itemNumber"), "itemNumber", ITEM_NUMBER_MAX_LEN)?;
        let supplier_item_id = lookup(catalog, &item_number, "itemNumber")?;

        let mut quantities = BTreeMap::new();
        for entry in entries(row, "inventory") {
            let Some(code) = get(entry, "warehouseCode").and_then(Value::as_str) else {
                continue;
            };
            if !PREMIER_WAREHOUSES.iter().any(|(known, _)| *known == code) {
                continue;
            }
            if let Some(quantity) = fields::integer(
                get(entry, "quantityAvailable"),
                "quantityAvailable",
                0,
                QUANTITY_MAX,
            ) {
                quantities.insert(code.to_owned(), quantity);
            }
        }

        Ok(Self {
            supplier_item_id,
            item_number,
            quantities,
        })
    }

    fn upsert_row(&self) -> UpsertRow {
        PREMIER_WAREHOUSES.iter().fold(
            UpsertRow::new(ItemTable::PremierItem).with_key("supplier_item_id", self.supplier_item_id),
            |row, (code, column)| row.with_field(*column, self.quantities.get(*code).copied()),
        )
    }
}

/// Turn14 `/v1/items` row, matched to the catalog by part number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn14Item {
    pub supplier_item_id: i64,
    pub item_id_in_api: String,
    pub part_number: String,
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// `box: length x width x height - weight`, boxes joined by ` | `.
    pub dimensions: Option<String>,
    pub thumbnail: Option<String>,
    pub barcode: Option<String>,
}

impl Turn14Item {
    pub fn from_row(row: &Value, catalog: &Catalog) -> Result<Self, MalformedRow> {
        let item_id_in_api = fields::required_text(get(row, "id"), "id", 20)?;
        let attributes = get(row, "attributes").ok_or_else(|| MalformedRow::missing("attributes"))?;
        let part_number = fields::strip_unprintable(&fields::required_text(
            get(attributes, "part_number"),
            "part_number",
            ITEM_NUMBER_MAX_LEN,
        )?);
        let supplier_item_id = lookup(catalog, &part_number, "part_number")?;

        let dimensions = entries(attributes, "dimensions")
            .map(|dimension| {
                format!(
                    "{}: {} x {} x {} - {}",
                    fields::display(get(dimension, "box_number")),
                    fields::display(get(dimension, "length")),
                    fields::display(get(dimension, "width")),
                    fields::display(get(dimension, "height")),
                    fields::display(get(dimension, "weight")),
                )
            })
            .collect::<Vec<_>>()
            .join(" | ");
        let dimensions = Value::String(dimensions);

        let bounded = |name: &'static str, max_len| fields::text(get(attributes, name), name, max_len);
        Ok(Self {
            supplier_item_id,
            item_id_in_api,
            part_number,
            product_name: bounded("product_name", 256),
            category: bounded("category", 256),
            subcategory: bounded("subcategory", 256),
            dimensions: fields::text(Some(&dimensions), "dimensions", 256),
            thumbnail: bounded("thumbnail", 256),
            barcode: bounded("barcode", 50),
        })
    }

    fn upsert_row(&self) -> UpsertRow {
        UpsertRow::new(ItemTable::Turn14Item)
            .with_key("supplier_item_id", self.supplier_item_id)
            .with_field("item_id_in_api", self.item_id_in_api.as_str())
            .with_field("product_name", self.product_name.clone())
            .with_field("category", self.category.clone())
            .with_field("subcategory", self.subcategory.clone())
            .with_field("dimensions", self.dimensions.clone())
            .with_field("thumbnail", self.thumbnail.clone())
            .with_field("barcode", self.barcode.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn14Media {
    pub url: String,
    pub media_content: Option<String>,
    pub height: Option<i64>,
    pub width: Option<i64>,
}

/// Turn14 `/v1/items/data` row: media files and vehicle fitments of one API item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn14ItemData {
    pub item_id_in_api: String,
    /// One entry per distinct URL; a later link with the same URL wins.
    pub media: Vec<Turn14Media>,
    /// Distinct, ascending.
    pub vehicle_ids: Vec<i64>,
}

impl Turn14ItemData {
    pub fn from_row(row: &Value) -> Result<Self, MalformedRow> {
        let item_id_in_api = fields::required_text(get(row, "id"), "id", 20)?;

        let mut media = BTreeMap::<String, Turn14Media>::new();
        let mut order = Vec::new();
        for file in entries(row, "files") {
            let media_content = fields::text(get(file, "media_content"), "media_content", 256);
            for link in entries(file, "links") {
                let Some(url) = fields::text(get(link, "url"), "url", 256) else {
                    continue;
                };
                let dimension = |name: &'static str| {
                    fields::number(get(link, name), name, 0.0, 65_535.0).map(|value| value as i64)
                };
                let entry = Turn14Media {
                    url: url.clone(),
                    media_content: media_content.clone(),
                    height: dimension("height"),
                    width: dimension("width"),
                };
                if media.insert(url.clone(), entry).is_none() {
                    order.push(url);
                }
            }
        }
        let media = order
            .into_iter()
            .filter_map(|url| media.remove(&url))
            .collect();

        let vehicle_ids = entries(row, "vehicle_fitments")
            .filter_map(|fitment| {
                fields::integer(get(fitment, "vehicle_id"), "vehicle_id", 0, 2_147_483_647)
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self {
            item_id_in_api,
            media,
            vehicle_ids,
        })
    }

    fn upsert_rows(&self) -> Vec<UpsertRow> {
        let media = self.media.iter().map(|media| {
            UpsertRow::new(ItemTable::Turn14Media)
                .with_key("item_id_in_api", self.item_id_in_api.as_str())
                .with_key("url", media.url.as_str())
                .with_field("media_content", media.media_content.clone())
                .with_field("height", media.height)
                .with_field("width", media.width)
        });
        let fitments = self.vehicle_ids.iter().map(|vehicle_id| {
            UpsertRow::new(ItemTable::Turn14Fitment)
                .with_key("item_id_in_api", self.item_id_in_api.as_str())
                .with_key("vehicle_id", *vehicle_id)
        });
        media.chain(fitments).collect()
    }
}

fn lookup(catalog: &Catalog, number: &str, field: &'static str) -> Result<i64, MalformedRow> {
    catalog
        .get(number)
        .copied()
        .ok_or_else(|| MalformedRow::new(field, format!("'{number}' is not an available catalog item")))
}

/// Elements of an array field; a missing or non-array field yields nothing.
fn entries<'a>(row: &'a Value, name: &str) -> impl Iterator<Item = &'a Value> {
    get(row, name)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}
