//! Python bindings for read-only catalog traversal.
//!
//! Entity handles borrow their catalog, which Python objects cannot do, so
//! the wrappers keep an `Arc<Catalog>` plus the row offset and rebuild the
//! handle on every call.

use std::path::PathBuf;
use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::catalog::{ApiModel, Catalog};
use crate::models::Fingerprint;

#[pyclass(name = "Catalog", frozen)]
pub struct PyCatalog {
    inner: Arc<Catalog>,
}

#[pymethods]
impl PyCatalog {
    #[staticmethod]
    fn open(py: Python<'_>, path: PathBuf) -> PyResult<Self> {
        let catalog = py.allow_threads(|| Catalog::open(&path))?;
        Ok(Self {
            inner: Arc::new(catalog),
        })
    }

    #[staticmethod]
    fn from_bytes(data: &[u8]) -> PyResult<Self> {
        Ok(Self {
            inner: Arc::new(Catalog::from_bytes(data)?),
        })
    }

    fn platforms(&self) -> Vec<String> {
        self.inner.platforms().map(|p| p.name().to_string()).collect()
    }

    fn frameworks(&self) -> Vec<String> {
        self.inner.frameworks().map(|f| f.name().to_string()).collect()
    }

    fn root_apis(&self) -> Vec<PyApi> {
        self.inner
            .root_apis()
            .map(|api| PyApi::wrap(&self.inner, api))
            .collect()
    }

    /// Look an API up by its hex fingerprint.
    fn api(&self, fingerprint: &str) -> PyResult<Option<PyApi>> {
        let fingerprint: Fingerprint = fingerprint.parse()?;
        Ok(self
            .inner
            .api_by_fingerprint(&fingerprint)
            .map(|api| PyApi::wrap(&self.inner, api)))
    }

    fn statistics<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let stats = self.inner.statistics();
        let dict = PyDict::new(py);
        dict.set_item("platforms", stats.platforms)?;
        dict.set_item("frameworks", stats.frameworks)?;
        dict.set_item("packages", stats.packages)?;
        dict.set_item("assemblies", stats.assemblies)?;
        dict.set_item("usage_sources", stats.usage_sources)?;
        dict.set_item("apis", stats.apis)?;
        dict.set_item("declarations", stats.declarations)?;
        dict.set_item("usages", stats.usages)?;
        dict.set_item("extension_methods", stats.extension_methods)?;
        dict.set_item("total_bytes", stats.total_bytes())?;
        Ok(dict)
    }
}

#[pyclass(name = "Api", frozen)]
pub struct PyApi {
    catalog: Arc<Catalog>,
    offset: u32,
}

impl PyApi {
    fn wrap(catalog: &Arc<Catalog>, api: ApiModel<'_>) -> Self {
        Self {
            catalog: Arc::clone(catalog),
            offset: api.offset(),
        }
    }

    fn model(&self) -> ApiModel<'_> {
        ApiModel::new(&self.catalog, self.offset)
    }
}

#[pymethods]
impl PyApi {
    #[getter]
    fn fingerprint(&self) -> String {
        self.model().fingerprint().to_string()
    }

    #[getter]
    fn kind(&self) -> String {
        serde_json::to_value(self.model().kind())
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    #[getter]
    fn name(&self) -> String {
        self.model().name().to_string()
    }

    #[getter]
    fn full_name(&self) -> String {
        self.model().full_name()
    }

    #[getter]
    fn parent(&self) -> Option<PyApi> {
        self.model()
            .parent()
            .map(|api| PyApi::wrap(&self.catalog, api))
    }

    fn children(&self) -> Vec<PyApi> {
        self.model()
            .sorted_children()
            .into_iter()
            .map(|api| PyApi::wrap(&self.catalog, api))
            .collect()
    }

    /// One dict per declaring assembly: name, version, syntax.
    fn declarations<'py>(&self, py: Python<'py>) -> PyResult<Vec<Bound<'py, PyDict>>> {
        let mut out = Vec::new();
        for declaration in self.model().declarations() {
            let assembly = declaration.assembly();
            let dict = PyDict::new(py);
            dict.set_item("assembly", assembly.name())?;
            dict.set_item("version", assembly.version())?;
            dict.set_item("syntax", declaration.syntax_text())?;
            dict.set_item(
                "obsolete",
                declaration.obsoletion().map(|o| o.message().to_string()),
            )?;
            out.push(dict);
        }
        Ok(out)
    }

    /// (usage source, percentage) pairs.
    fn usages(&self) -> Vec<(String, f32)> {
        self.model()
            .usages()
            .map(|u| (u.usage_source().name().to_string(), u.percentage()))
            .collect()
    }

    /// Framework names the API is available in.
    fn frameworks(&self) -> Vec<String> {
        self.model()
            .availability()
            .frameworks
            .iter()
            .map(|a| a.framework.name().to_string())
            .collect()
    }

    fn __repr__(&self) -> String {
        format!("<Api {} {}>", self.fingerprint(), self.full_name())
    }
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyCatalog>()?;
    m.add_class::<PyApi>()?;
    m.add("FORMAT_VERSION", crate::format::FORMAT_VERSION)?;
    Ok(())
}
