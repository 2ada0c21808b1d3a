pub mod to_asap_xml;
pub mod to_csv_metrics;
