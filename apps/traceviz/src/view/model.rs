use traceviz_model::Hop;

pub const PRIVATE: &str = "Private";

/// One table cell. Values the backend could not resolve show as `Private`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub private: bool,
}

impl Cell {
    fn of(value: Option<&str>) -> Self {
        match value {
            Some(text) => Self {
                text: text.to_string(),
                private: false,
            },
            None => Self {
                text: PRIVATE.to_string(),
                private: true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HopRow {
    /// 1-based position in the trace.
    pub number: usize,
    pub ip: Cell,
    pub latitude: Cell,
    pub longitude: Cell,
    pub city: Cell,
    pub state: Cell,
    pub country: Cell,
}

impl HopRow {
    pub fn new(number: usize, hop: &Hop) -> Self {
        let coordinates = hop.coordinates();
        let latitude = coordinates.map(|c| c.latitude.to_string());
        let longitude = coordinates.map(|c| c.longitude.to_string());

        Self {
            number,
            ip: Cell::of(hop.ip()),
            latitude: Cell::of(latitude.as_deref()),
            longitude: Cell::of(longitude.as_deref()),
            city: Cell::of(hop.city()),
            state: Cell::of(hop.state()),
            country: Cell::of(hop.country()),
        }
    }

    pub fn cells(&self) -> [&Cell; 6] {
        [
            &self.ip,
            &self.latitude,
            &self.longitude,
            &self.city,
            &self.state,
            &self.country,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_values_are_private() {
        let hop = Hop {
            ip: None,
            latitude: Some(0.0),
            longitude: Some(0.0),
            country: Some("Germany".to_string()),
            ..Hop::default()
        };
        let row = HopRow::new(3, &hop);
        assert_eq!(row.number, 3);
        assert!(row.ip.private);
        assert_eq!(row.latitude.text, PRIVATE);
        assert!(row.longitude.private);
        assert_eq!(row.country.text, "Germany");
        assert!(!row.country.private);
    }

    #[test]
    fn resolved_coordinates_are_shown() {
        let hop = Hop {
            ip: Some("93.184.216.34".to_string()),
            latitude: Some(42.15),
            longitude: Some(-70.8228),
            ..Hop::default()
        };
        let row = HopRow::new(1, &hop);
        assert_eq!(row.latitude.text, "42.15");
        assert_eq!(row.longitude.text, "-70.8228");
        assert!(row.city.private);
    }
}
