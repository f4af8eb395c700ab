//! Output formatting utilities
//!
//! Provides table, JSON and compact output for CLI commands.

use crate::cli::args::OutputFormat;
use crate::domain::{Device, P2PLinkType, StatusSnapshot};
use serde::Serialize;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

impl<T: TableDisplay> TableDisplay for Vec<T> {
    fn to_table(&self) -> String {
        self.iter()
            .map(|item| item.to_table())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn to_compact(&self) -> String {
        self.iter()
            .map(|item| item.to_compact())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

/// GPU list entry for display
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListEntry {
    pub index: u32,
    pub name: String,
    pub bus_id: Option<String>,
    pub family: Option<String>,
    pub arch: Option<String>,
}

impl From<&Device> for DeviceListEntry {
    fn from(device: &Device) -> Self {
        Self {
            index: device.index,
            name: device.display_name(),
            bus_id: device.bus_id().map(str::to_string),
            family: device.compute().map(|c| c.family.clone()),
            arch: device.compute().map(|c| c.arch.clone()),
        }
    }
}

impl TableDisplay for DeviceListEntry {
    fn to_table(&self) -> String {
        let arch = match (&self.family, &self.arch) {
            (Some(family), Some(arch)) => format!("{} {}", family, arch),
            _ => "N/A".to_string(),
        };
        format!(
            "[{}] {} (Bus: {}, Arch: {})",
            self.index,
            self.name,
            or_na(self.bus_id.as_deref()),
            arch
        )
    }

    fn to_compact(&self) -> String {
        format!("{}:{}", self.index, self.name)
    }
}

/// GPU list for display
#[derive(Debug, Clone, Serialize)]
pub struct DeviceList {
    pub cuda_version: Option<String>,
    pub driver_version: Option<String>,
    pub gpus: Vec<DeviceListEntry>,
}

impl TableDisplay for DeviceList {
    fn to_table(&self) -> String {
        let mut output = format!(
            "CUDA Version: {}\nDriver Version: {}\n",
            or_na(self.cuda_version.as_deref()),
            or_na(self.driver_version.as_deref())
        );
        output.push_str(&format!("GPUs Found: {}\n\n", self.gpus.len()));

        for gpu in &self.gpus {
            output.push_str(&gpu.to_table());
            output.push('\n');
        }

        output
    }

    fn to_compact(&self) -> String {
        self.gpus
            .iter()
            .map(|g| g.to_compact())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl TableDisplay for Device {
    fn to_table(&self) -> String {
        let mut output = format!("[{}] {}\n", self.index, self.display_name());

        if let Some(m) = self.management() {
            output.push_str(&format!("  UUID:          {}\n", m.uuid));
            output.push_str(&format!("  Device Node:   {}\n", m.path));
            output.push_str(&format!("  Power Limit:   {}W\n", m.power_watts));
            output.push_str(&format!("  PCI Bus:       {}\n", m.pci.bus_id));
            output.push_str(&format!(
                "  PCIe Link:     {} ({} GB/s)\n",
                m.pci.link, m.pci.bandwidth_gbps
            ));
            output.push_str(&format!("  BAR1:          {} MiB\n", m.pci.bar1_mib));
            output.push_str(&format!(
                "  Max Clocks:    {} MHz core, {} MHz memory\n",
                m.clocks.core, m.clocks.memory
            ));
        }

        if let Some(c) = self.compute() {
            output.push_str(&format!("  Architecture:  {} ({})\n", c.family, c.arch));
            output.push_str(&format!("  CUDA Cores:    {}\n", c.cores));
            output.push_str(&format!("  Hyper-Q:       {}\n", c.hyper_q));
            output.push_str(&format!(
                "  Memory:        {} MiB global, {} GB/s{}\n",
                c.memory.global_mib,
                c.memory.bandwidth_gbps,
                if c.memory.ecc { ", ECC" } else { "" }
            ));
            output.push_str(&format!(
                "  Caches:        {} KiB L2, {} KiB shared, {} KiB constant\n",
                c.memory.l2_cache_kib, c.memory.shared_kib, c.memory.constant_kib
            ));
        }

        for link in &self.topology {
            output.push_str(&format!("  Link to {}: {}\n", link.peer_bus_id, link.link));
        }

        output.trim_end().to_string()
    }

    fn to_compact(&self) -> String {
        let arch = self
            .compute()
            .map(|c| format!(" sm_{}", c.arch.replace('.', "")))
            .unwrap_or_default();
        format!(
            "{}:{}{} {}",
            self.index,
            self.display_name(),
            arch,
            or_na(self.bus_id())
        )
    }
}

/// Status snapshot of one GPU
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub index: u32,
    #[serde(flatten)]
    pub status: StatusSnapshot,
}

impl TableDisplay for DeviceStatus {
    fn to_table(&self) -> String {
        let s = &self.status;
        let mut output = format!(
            "[{}] {}\n",
            self.index,
            s.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        output.push_str(&format!("  Power:         {}W\n", s.power_watts));
        output.push_str(&format!("  Temperature:   {}°C\n", s.temperature));
        output.push_str(&format!(
            "  Utilization:   {}% GPU, {}% memory, {}% encoder, {}% decoder\n",
            s.utilization.gpu, s.utilization.memory, s.utilization.encoder, s.utilization.decoder
        ));
        output.push_str(&format!(
            "  Memory:        {} / {} MiB ({:.1}%)\n",
            s.memory.used / (1024 * 1024),
            s.memory.total / (1024 * 1024),
            s.memory_used_percent()
        ));
        output.push_str(&format!(
            "  ECC Errors:    {} L1, {} L2, {} global\n",
            s.memory.ecc_errors.l1_cache, s.memory.ecc_errors.l2_cache, s.memory.ecc_errors.global
        ));
        output.push_str(&format!(
            "  Clocks:        {} MHz core, {} MHz memory\n",
            s.clocks.core, s.clocks.memory
        ));
        output.push_str(&format!(
            "  PCIe:          {} MiB BAR1 used, RX {} KB/s, TX {} KB/s\n",
            s.pci.bar1_used_mib, s.pci.throughput.rx, s.pci.throughput.tx
        ));

        if s.processes.is_empty() {
            output.push_str("  Processes:     none");
        } else {
            output.push_str("  Processes:");
            for p in &s.processes {
                output.push_str(&format!("\n    {:>8}  {}", p.pid, p.name));
            }
        }

        output
    }

    fn to_compact(&self) -> String {
        let s = &self.status;
        format!(
            "{}:{}W {}C {}% {}procs",
            self.index,
            s.power_watts,
            s.temperature,
            s.utilization.gpu,
            s.processes.len()
        )
    }
}

/// Link between two GPUs
#[derive(Debug, Clone, Serialize)]
pub struct TopologyEntry {
    pub index: u32,
    pub peer: u32,
    pub link: P2PLinkType,
    /// Direct peer memory access, when the CUDA driver is available
    pub peer_access: Option<bool>,
}

/// Pairwise links between all GPUs
#[derive(Debug, Clone, Serialize)]
pub struct TopologyMatrix {
    pub bus_ids: Vec<String>,
    pub links: Vec<TopologyEntry>,
}

impl TopologyMatrix {
    fn link(&self, index: u32, peer: u32) -> Option<&TopologyEntry> {
        self.links
            .iter()
            .find(|e| e.index == index && e.peer == peer)
    }
}

impl TableDisplay for TopologyMatrix {
    fn to_table(&self) -> String {
        let count = self.bus_ids.len() as u32;
        let mut output = String::from("      ");
        for peer in 0..count {
            output.push_str(&format!("{:>6}", format!("GPU{}", peer)));
        }
        output.push('\n');

        for index in 0..count {
            output.push_str(&format!("{:<6}", format!("GPU{}", index)));
            for peer in 0..count {
                let cell = if index == peer {
                    "X".to_string()
                } else {
                    match self.link(index, peer) {
                        Some(e) if e.peer_access == Some(true) => {
                            format!("{}*", e.link.short_label())
                        }
                        Some(e) => e.link.short_label().to_string(),
                        None => "-".to_string(),
                    }
                };
                output.push_str(&format!("{:>6}", cell));
            }
            output.push('\n');
        }

        output.push('\n');
        for (index, bus_id) in self.bus_ids.iter().enumerate() {
            output.push_str(&format!("GPU{}: {}\n", index, bus_id));
        }
        output.push_str("\n* = peer access supported");
        output
    }

    fn to_compact(&self) -> String {
        self.links
            .iter()
            .map(|e| format!("{}-{}:{}", e.index, e.peer, e.link.short_label()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// CUDA and driver versions
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub gpuprobe: String,
    pub cuda: Option<String>,
    pub driver: Option<String>,
}

impl TableDisplay for VersionInfo {
    fn to_table(&self) -> String {
        format!(
            "gpuprobe:       {}\nCUDA Version:   {}\nDriver Version: {}",
            self.gpuprobe,
            or_na(self.cuda.as_deref()),
            or_na(self.driver.as_deref())
        )
    }

    fn to_compact(&self) -> String {
        format!(
            "cuda={} driver={}",
            or_na(self.cuda.as_deref()),
            or_na(self.driver.as_deref())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_entry_without_compute() {
        let entry = DeviceListEntry {
            index: 0,
            name: "Tesla V100".into(),
            bus_id: Some("00000000:3B:00.0".into()),
            family: None,
            arch: None,
        };
        assert_eq!(
            entry.to_table(),
            "[0] Tesla V100 (Bus: 00000000:3B:00.0, Arch: N/A)"
        );
        assert_eq!(entry.to_compact(), "0:Tesla V100");
    }

    #[test]
    fn test_topology_matrix_table() {
        let matrix = TopologyMatrix {
            bus_ids: vec!["00000000:01:00.0".into(), "00000000:02:00.0".into()],
            links: vec![
                TopologyEntry {
                    index: 0,
                    peer: 1,
                    link: P2PLinkType::SingleSwitch,
                    peer_access: Some(true),
                },
                TopologyEntry {
                    index: 1,
                    peer: 0,
                    link: P2PLinkType::SingleSwitch,
                    peer_access: None,
                },
            ],
        };

        let table = matrix.to_table();
        assert!(table.contains("PIX*"));
        assert!(table.contains("GPU1: 00000000:02:00.0"));
        assert_eq!(matrix.to_compact(), "0-1:PIX, 1-0:PIX");
    }

    #[test]
    fn test_version_info() {
        let info = VersionInfo {
            gpuprobe: "0.1.0".into(),
            cuda: Some("12.4".into()),
            driver: None,
        };
        assert_eq!(info.to_compact(), "cuda=12.4 driver=N/A");
    }

    #[test]
    fn test_vec_compact_joins_lines() {
        let entries = vec![
            VersionInfo {
                gpuprobe: "0.1.0".into(),
                cuda: None,
                driver: None,
            },
            VersionInfo {
                gpuprobe: "0.1.0".into(),
                cuda: Some("11.8".into()),
                driver: None,
            },
        ];
        assert_eq!(
            entries.to_compact(),
            "cuda=N/A driver=N/A\ncuda=11.8 driver=N/A"
        );
    }
}
