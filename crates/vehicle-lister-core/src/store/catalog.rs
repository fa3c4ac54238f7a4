//! The static brand reference catalog seeded into every fresh store.

/// Bump when `BRAND_CATALOG` changes so existing stores get re-seeded.
pub const BRAND_CATALOG_VERSION: u32 = 4;

pub const BRAND_CATALOG: &[&str] = &[
    "ABARTH", "ACURA", "AIXAM", "ALFA ROMEO", "ANDORIA", "ARO", "ASTON MARTIN", "AUDI",
    "AUSTIN", "AVIA", "BEDFORD", "BENTLEY", "BMW", "BUICK", "CADILLAC", "CHERY", "CHEVROLET",
    "CHRYSLER", "CITROEN", "DACIA", "DAEWOO", "DAF", "DAIHATSU", "DODGE", "DS", "ELARIS",
    "FERRARI", "FIAT", "FORD", "FORD USA", "FSO", "GAZ", "GEO", "GMC", "GREAT WALL", "HONDA",
    "HUMMER", "HYUNDAI", "INFINITI", "INNOCENTI", "ISUZU", "IVECO", "JAGUAR", "JEEP", "KIA",
    "LADA", "LAMBORGHINI", "LANCIA", "LAND ROVER", "LDV", "LEXUS", "LINCOLN", "LOTUS", "MAN",
    "MASERATI", "MAYBACH", "MAZDA", "MCLAREN", "MERCEDES-BENZ", "MG", "MINI", "MITSUBISHI",
    "NISSAN", "OPEL", "PEUGEOT", "PLYMOUTH", "PONTIAC", "PORSCHE", "RENAULT", "RENAULT TRUCKS",
    "ROLLS-ROYCE", "ROVER", "SAAB", "SEAT", "SEVIC", "SKODA", "SMART", "SSANGYONG", "SUBARU",
    "SUZUKI", "TATA", "TESLA", "TOYOTA", "TRABANT", "UAZ", "VOLVO", "VW", "WARTBURG", "ZASTAVA",
    "ZAZ",
];
