use crate::models::catalog::{AdapterDescriptor, ServiceCatalog};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

// Catalogs are configuration, not data; anything this large is a mistake.
const MAX_CATALOG_SIZE: u64 = 10 * 1024 * 1024;

/// Loads the service catalog snapshot.
///
/// The primary source is the JSON catalog file; when it is absent the
/// services directory is scanned for per-adapter `*.json` descriptors
/// instead. Either way the result is immutable for the life of the
/// process — adapter changes are a restart, not a mutation.
pub fn load_catalog(
    catalog_path: &str,
    services_dir: &str,
) -> Result<ServiceCatalog, Box<dyn std::error::Error>> {
    let path = Path::new(catalog_path);
    if path.exists() {
        debug!("Loading adapter catalog from {}", catalog_path);
        return read_catalog_file(path);
    }

    warn!(
        "Catalog file {} not found, scanning {} for adapter descriptors",
        catalog_path, services_dir
    );
    scan_services_dir(services_dir)
}

fn read_catalog_file(path: &Path) -> Result<ServiceCatalog, Box<dyn std::error::Error>> {
    let metadata = fs::metadata(path)
        .map_err(|e| format!("Cannot read catalog metadata '{}': {}", path.display(), e))?;
    if metadata.len() > MAX_CATALOG_SIZE {
        return Err(format!(
            "Catalog file too large: {} bytes (max: {} bytes)",
            metadata.len(),
            MAX_CATALOG_SIZE
        )
        .into());
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read catalog file '{}': {}", path.display(), e))?;
    let catalog: ServiceCatalog =
        serde_json::from_str(&raw).map_err(|e| format!("Invalid catalog JSON: {}", e))?;

    info!(
        "Loaded catalog: {} adapters ({} enabled), {} api services",
        catalog.adapters.len(),
        catalog.enabled_adapters().count(),
        catalog.api_services.len()
    );
    Ok(catalog)
}

/// Fallback discovery: every `*.json` file in the services directory is a
/// single [`AdapterDescriptor`]. Files that fail to parse are skipped with
/// a warning so one broken descriptor cannot take the gateway down.
fn scan_services_dir(dir: &str) -> Result<ServiceCatalog, Box<dyn std::error::Error>> {
    let mut adapters: Vec<AdapterDescriptor> = Vec::new();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Services directory {} unreadable ({}), starting with empty catalog", dir, e);
            return Ok(ServiceCatalog::default());
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    paths.sort();

    for path in paths {
        match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<AdapterDescriptor>(&raw).map_err(|e| e.to_string()))
        {
            Ok(descriptor) => {
                debug!("Discovered adapter descriptor {} from {}", descriptor.id, path.display());
                adapters.push(descriptor);
            }
            Err(e) => warn!("Skipping adapter descriptor {}: {}", path.display(), e),
        }
    }

    info!("Scanned {}: {} adapter descriptors", dir, adapters.len());
    Ok(ServiceCatalog { adapters, ..Default::default() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adapters.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"adapters": [{{"id": "ngrok", "type": "real", "base_url": "https://api.ngrok.com"}}]}}"#
        )
        .unwrap();

        let catalog = load_catalog(path.to_str().unwrap(), "./nonexistent").unwrap();
        assert_eq!(catalog.adapters.len(), 1);
        assert_eq!(catalog.adapters[0].id, "ngrok");
    }

    #[test]
    fn falls_back_to_directory_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("paystack.json"),
            r#"{"id": "paystack", "type": "real", "base_url": "https://api.paystack.co"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog =
            load_catalog("./definitely-missing.json", dir.path().to_str().unwrap()).unwrap();
        assert_eq!(catalog.adapters.len(), 1);
        assert_eq!(catalog.adapters[0].id, "paystack");
    }

    #[test]
    fn missing_everything_is_an_empty_catalog() {
        let catalog = load_catalog("./missing.json", "./also-missing").unwrap();
        assert!(catalog.adapters.is_empty());
    }
}
