//! Catalog-wide counts.

use std::fmt;

use serde::Serialize;

use super::Catalog;
use crate::format::layout::{
    experimental_row, obsoletion_row, platform_support_row, preview_requirement_row, TableId,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStatistics {
    pub platforms: usize,
    pub frameworks: usize,
    pub packages: usize,
    pub assemblies: usize,
    pub usage_sources: usize,
    pub apis: usize,
    pub root_apis: usize,
    pub declarations: usize,
    pub usages: usize,
    pub extension_methods: usize,
    pub obsoletions: usize,
    pub platform_support: usize,
    pub preview_requirements: usize,
    pub experimentals: usize,
    /// Uncompressed size per table, in on-disk order.
    pub table_sizes: Vec<(&'static str, usize)>,
}

impl CatalogStatistics {
    pub fn compute(catalog: &Catalog) -> CatalogStatistics {
        let mut stats = CatalogStatistics {
            platforms: catalog.platforms().len(),
            frameworks: catalog.frameworks().count(),
            packages: catalog.packages().count(),
            assemblies: catalog.assemblies().count(),
            usage_sources: catalog.usage_sources().len(),
            root_apis: catalog.root_apis().len(),
            extension_methods: catalog.extension_methods().len(),
            obsoletions: catalog.table_size(TableId::Obsoletions) / obsoletion_row::SIZE,
            platform_support: catalog.table_size(TableId::PlatformSupport)
                / platform_support_row::SIZE,
            preview_requirements: catalog.table_size(TableId::PreviewRequirements)
                / preview_requirement_row::SIZE,
            experimentals: catalog.table_size(TableId::Experimentals) / experimental_row::SIZE,
            table_sizes: TableId::ALL
                .iter()
                .map(|table| (table.name(), catalog.table_size(*table)))
                .collect(),
            ..CatalogStatistics::default()
        };
        for api in catalog.all_apis() {
            stats.apis += 1;
            stats.declarations += api.declarations().len();
            stats.usages += api.usages().len();
        }
        stats
    }

    pub fn total_bytes(&self) -> usize {
        self.table_sizes.iter().map(|(_, size)| size).sum()
    }
}

impl fmt::Display for CatalogStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "platforms            {}", self.platforms)?;
        writeln!(f, "frameworks           {}", self.frameworks)?;
        writeln!(f, "packages             {}", self.packages)?;
        writeln!(f, "assemblies           {}", self.assemblies)?;
        writeln!(f, "usage sources        {}", self.usage_sources)?;
        writeln!(f, "apis                 {}", self.apis)?;
        writeln!(f, "root apis            {}", self.root_apis)?;
        writeln!(f, "declarations         {}", self.declarations)?;
        writeln!(f, "usages               {}", self.usages)?;
        writeln!(f, "extension methods    {}", self.extension_methods)?;
        writeln!(f, "obsoletions          {}", self.obsoletions)?;
        writeln!(f, "platform support     {}", self.platform_support)?;
        writeln!(f, "preview requirements {}", self.preview_requirements)?;
        writeln!(f, "experimentals        {}", self.experimentals)?;
        for (name, size) in &self.table_sizes {
            writeln!(f, "  {name:<22} {size:>10} bytes")?;
        }
        write!(f, "  {:<22} {:>10} bytes", "total", self.total_bytes())
    }
}
