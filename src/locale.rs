use crate::model::ReservationStatus;

/// Display language for cell placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Lang {
    #[default]
    En,
    Fr,
    Ar,
}

impl Lang {
    /// Unknown codes fall back to English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "fr" => Lang::Fr,
            "ar" => Lang::Ar,
            _ => Lang::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Fr => "fr",
            Lang::Ar => "ar",
        }
    }

    /// Label shown on a cell whose reservation has no guest name.
    pub fn status_label(&self, status: ReservationStatus) -> &'static str {
        match (self, status) {
            (Lang::En, ReservationStatus::Reserved) => "Reserved",
            (Lang::En, ReservationStatus::Occupied) => "Occupied",
            (Lang::Fr, ReservationStatus::Reserved) => "Réservé",
            (Lang::Fr, ReservationStatus::Occupied) => "Occupé",
            (Lang::Ar, ReservationStatus::Reserved) => "محجوز",
            (Lang::Ar, ReservationStatus::Occupied) => "مشغول",
        }
    }
}
