//! Which declaration of an API each framework sees.
//!
//! A framework that ships an assembly declaring the API in-box uses that
//! declaration.  Otherwise every package that ships the API is asked which of
//! its folders the framework would consume (nearest compatible folder,
//! portable folders excluded); the first package whose chosen folder
//! contains a declaring assembly supplies the declaration.

use std::collections::HashMap;

use tracing::debug;

use super::entities::{ApiDeclarationModel, ApiModel, FrameworkModel, PackageModel};
use super::frameworks::TargetFramework;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApiFrameworkAvailability<'a> {
    pub framework: FrameworkModel<'a>,
    pub declaration: ApiDeclarationModel<'a>,
    /// Package and folder the declaration comes from; `None` when in-box.
    pub package: Option<(PackageModel<'a>, FrameworkModel<'a>)>,
}

impl ApiFrameworkAvailability<'_> {
    pub fn is_in_box(&self) -> bool {
        self.package.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiAvailability<'a> {
    pub frameworks: Vec<ApiFrameworkAvailability<'a>>,
}

impl<'a> ApiAvailability<'a> {
    pub fn for_framework(&self, name: &str) -> Option<&ApiFrameworkAvailability<'a>> {
        self.frameworks.iter().find(|a| a.framework.name() == name)
    }

    pub fn is_available_in(&self, name: &str) -> bool {
        self.for_framework(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.frameworks.is_empty()
    }
}

impl<'a> ApiModel<'a> {
    pub fn availability(&self) -> ApiAvailability<'a> {
        let catalog = self.catalog();

        let mut in_box: HashMap<FrameworkModel<'a>, ApiDeclarationModel<'a>> = HashMap::new();
        let mut shipped = Vec::new();
        let mut packages: Vec<PackageModel<'a>> = Vec::new();
        for declaration in self.declarations() {
            let assembly = declaration.assembly();
            for framework in assembly.frameworks() {
                in_box.entry(framework).or_insert(declaration);
            }
            for (package, folder) in assembly.packages() {
                shipped.push((package, folder, declaration));
                if !packages.contains(&package) {
                    packages.push(package);
                }
            }
        }

        // Folders per package, portable ones dropped.
        let folders: Vec<Vec<(FrameworkModel<'a>, TargetFramework)>> = packages
            .iter()
            .map(|package| {
                let mut folders: Vec<(FrameworkModel<'a>, TargetFramework)> = Vec::new();
                for (folder, _) in package.assemblies() {
                    if folders.iter().any(|(f, _)| *f == folder) {
                        continue;
                    }
                    let target = TargetFramework::parse(folder.name());
                    if !target.is_portable() {
                        folders.push((folder, target));
                    }
                }
                folders
            })
            .collect();

        let mut availability = ApiAvailability::default();
        for framework in catalog.frameworks() {
            if let Some(&declaration) = in_box.get(&framework) {
                availability.frameworks.push(ApiFrameworkAvailability {
                    framework,
                    declaration,
                    package: None,
                });
                continue;
            }

            let target = TargetFramework::parse(framework.name());
            if target.is_portable() {
                continue;
            }
            for (package, package_folders) in packages.iter().zip(&folders) {
                let targets: Vec<TargetFramework> =
                    package_folders.iter().map(|(_, t)| t.clone()).collect();
                let Some(index) = target.nearest(&targets) else {
                    continue;
                };
                let folder = package_folders[index].0;
                let found = shipped
                    .iter()
                    .find(|(p, f, _)| p == package && *f == folder)
                    .map(|(_, _, declaration)| *declaration);
                if let Some(declaration) = found {
                    availability.frameworks.push(ApiFrameworkAvailability {
                        framework,
                        declaration,
                        package: Some((*package, folder)),
                    });
                    break;
                }
            }
        }

        debug!(
            api = %self.fingerprint(),
            frameworks = availability.frameworks.len(),
            "computed availability"
        );
        availability
    }
}
