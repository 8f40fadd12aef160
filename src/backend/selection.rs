// Device and swapchain parameter selection
//
// `First` takes index 0 of whatever the driver reports. `Preferred` scores
// devices (discrete GPU first) and prefers sRGB output and the configured
// present mode.

use crate::config::SelectionPolicy;
use anyhow::Result;
use ash::vk;

use super::api::PhysicalDeviceInfo;

/// Index of the physical device to use, `None` when the list is empty
pub fn physical_device(policy: SelectionPolicy, devices: &[PhysicalDeviceInfo]) -> Option<usize> {
    match policy {
        SelectionPolicy::First => (!devices.is_empty()).then_some(0),
        SelectionPolicy::Preferred => devices
            .iter()
            .enumerate()
            .max_by_key(|(index, info)| {
                let score = match info.device_type {
                    vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                    vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                    _ => 1,
                };
                // Earlier devices win ties
                (score, std::cmp::Reverse(*index))
            })
            .map(|(index, _)| index),
    }
}

/// Queue family that supports both graphics and presentation
pub fn queue_family<F>(
    policy: SelectionPolicy,
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> Result<Option<u32>>
where
    F: FnMut(u32) -> Result<bool>,
{
    let candidates = match policy {
        SelectionPolicy::First => families.len().min(1),
        SelectionPolicy::Preferred => families.len(),
    };

    for (index, family) in families.iter().take(candidates).enumerate() {
        let index = index as u32;
        if family.queue_count > 0
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && supports_present(index)?
        {
            return Ok(Some(index));
        }
    }

    Ok(None)
}

pub fn surface_format(
    policy: SelectionPolicy,
    formats: &[vk::SurfaceFormatKHR],
) -> Option<vk::SurfaceFormatKHR> {
    match policy {
        SelectionPolicy::First => formats.first().copied(),
        SelectionPolicy::Preferred => formats
            .iter()
            .find(|f| {
                f.format == vk::Format::B8G8R8A8_SRGB
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
            .or_else(|| formats.first())
            .copied(),
    }
}

pub fn present_mode(
    policy: SelectionPolicy,
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    match policy {
        // FIFO is always supported, so it backs up an empty list
        SelectionPolicy::First => modes.first().copied().unwrap_or(vk::PresentModeKHR::FIFO),
        SelectionPolicy::Preferred => {
            if modes.contains(&preferred) {
                preferred
            } else {
                vk::PresentModeKHR::FIFO
            }
        }
    }
}

pub fn image_count(policy: SelectionPolicy, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    match policy {
        SelectionPolicy::First => caps.min_image_count,
        SelectionPolicy::Preferred => {
            let count = caps.min_image_count + 1;
            if caps.max_image_count > 0 && count > caps.max_image_count {
                caps.max_image_count
            } else {
                count
            }
        }
    }
}

pub fn extent(
    policy: SelectionPolicy,
    caps: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    match policy {
        SelectionPolicy::First => caps.max_image_extent,
        SelectionPolicy::Preferred => {
            if caps.current_extent.width != u32::MAX {
                caps.current_extent
            } else {
                vk::Extent2D {
                    width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
                    height: height
                        .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
                }
            }
        }
    }
}
