use serde::Serialize;

/// A device in the aquad system.
///
/// A device represents a physical unit (a heat pump, say) that owns one or more entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub sw_version: Option<String>,
    pub entity_ids: Vec<String>,
}

impl Device {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            identifiers: Vec::new(),
            name,
            manufacturer: None,
            model: None,
            sw_version: None,
            entity_ids: Vec::new(),
        }
    }

    pub fn add_entity(&mut self, entity_id: String) {
        if !self.entity_ids.contains(&entity_id) {
            self.entity_ids.push(entity_id);
        }
    }
}
