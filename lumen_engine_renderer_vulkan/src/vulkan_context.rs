/// VulkanContext - instance, surface, physical and logical device
///
/// Owns every object whose lifetime spans the whole backend. Destroyed in
/// reverse creation order: device, surface, debug messenger, instance.

use ash::vk;
use lumen_engine::lumen::{Config, Error, Result};
use lumen_engine::{engine_debug, engine_error, engine_info};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};

const SOURCE: &str = "lumen::vulkan";
const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

fn init_error(message: String) -> Error {
    engine_error!(SOURCE, "{}", message);
    Error::InitializationFailed(message)
}

/// Queue family indices of a suitable physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices (one entry when graphics and present share a family)
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

pub struct VulkanContext {
    _entry: ash::Entry,
    pub instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub surface_loader: ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub swapchain_loader: ash::khr::swapchain::Device,
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    /// Anisotropic filtering was enabled on the logical device
    pub sampler_anisotropy: bool,
}

impl VulkanContext {
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| init_error(format!("Failed to load Vulkan library: {:?}", e)))?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| init_error(format!("Invalid application name: {}", e)))?;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Lumen")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle()
                .map_err(|e| init_error(format!("Failed to get display handle: {}", e)))?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| init_error(format!("Failed to get required extensions: {:?}", e)))?
                .to_vec();

            let layer_names = if config.enable_validation {
                if !Self::validation_layer_available(&entry)? {
                    return Err(init_error(format!(
                        "Validation requested but {} is not installed",
                        VALIDATION_LAYER.to_string_lossy()
                    )));
                }
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| init_error(format!("Failed to create instance: {:?}", e)))?;

            // From here on every early return must destroy what was already created
            let debug_utils = if config.enable_validation {
                match Self::create_debug_messenger(&entry, &instance, config) {
                    Ok(pair) => Some(pair),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let destroy_instance = |debug_utils: &Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>| {
                if let Some((loader, messenger)) = debug_utils {
                    crate::debug::cleanup_debug_config();
                    loader.destroy_debug_utils_messenger(*messenger, None);
                }
                instance.destroy_instance(None);
            };

            let surface = match window.window_handle() {
                Ok(window_handle) => ash_window::create_surface(
                    &entry,
                    &instance,
                    display_handle.as_raw(),
                    window_handle.as_raw(),
                    None,
                )
                .map_err(|e| init_error(format!("Failed to create surface: {:?}", e))),
                Err(e) => Err(init_error(format!("Failed to get window handle: {}", e))),
            };
            let surface = match surface {
                Ok(surface) => surface,
                Err(e) => {
                    destroy_instance(&debug_utils);
                    return Err(e);
                }
            };

            let selected = Self::pick_physical_device(&instance, &surface_loader, surface)
                .and_then(|(physical_device, queue_families)| {
                    let supported = instance.get_physical_device_features(physical_device);
                    let sampler_anisotropy = supported.sampler_anisotropy == vk::TRUE;
                    Self::create_logical_device(&instance, physical_device, queue_families, sampler_anisotropy)
                        .map(|device| (physical_device, queue_families, device, sampler_anisotropy))
                });
            let (physical_device, queue_families, device, sampler_anisotropy) = match selected {
                Ok(selected) => selected,
                Err(e) => {
                    surface_loader.destroy_surface(surface, None);
                    destroy_instance(&debug_utils);
                    return Err(e);
                }
            };

            let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
            let present_queue = device.get_device_queue(queue_families.present, 0);
            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

            engine_info!(SOURCE, "Vulkan context ready (graphics family {}, present family {})",
                queue_families.graphics, queue_families.present);

            Ok(Self {
                _entry: entry,
                instance,
                debug_utils,
                surface_loader,
                surface,
                physical_device,
                device,
                swapchain_loader,
                queue_families,
                graphics_queue,
                present_queue,
                sampler_anisotropy,
            })
        }
    }

    unsafe fn validation_layer_available(entry: &ash::Entry) -> Result<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(|e| init_error(format!("Failed to enumerate instance layers: {:?}", e)))?;
        Ok(layers.iter().any(|layer| {
            layer.layer_name_as_c_str().map(|name| name == VALIDATION_LAYER).unwrap_or(false)
        }))
    }

    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &Config,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);
        crate::debug::init_debug_config(config.debug_severity);

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| init_error(format!("Failed to create debug messenger: {:?}", e)))?;
        Ok((debug_utils, messenger))
    }

    /// Enumerate every GPU and keep the last suitable one
    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| init_error(format!("Failed to enumerate physical devices: {:?}", e)))?;

        let mut selected = None;
        for physical_device in physical_devices {
            let properties = instance.get_physical_device_properties(physical_device);
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "<unnamed>".to_string());
            engine_info!(SOURCE, "Found GPU: {}", name);

            match Self::suitable_queue_families(instance, surface_loader, surface, physical_device) {
                Some(families) => {
                    engine_debug!(SOURCE, "{} is suitable", name);
                    selected = Some((physical_device, families, name));
                }
                None => engine_debug!(SOURCE, "{} is not suitable", name),
            }
        }

        let (physical_device, families, name) = selected
            .ok_or_else(|| init_error("No suitable GPU found".to_string()))?;
        engine_info!(SOURCE, "Using GPU: {}", name);
        Ok((physical_device, families))
    }

    /// Queue families of a device that can render to and present on the surface
    unsafe fn suitable_queue_families(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Option<QueueFamilies> {
        let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

        let graphics = queue_families
            .iter()
            .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))? as u32;
        let present = (0..queue_families.len() as u32).find(|&index| {
            surface_loader
                .get_physical_device_surface_support(physical_device, index, surface)
                .unwrap_or(false)
        })?;

        let extensions = instance.enumerate_device_extension_properties(physical_device).ok()?;
        let has_swapchain = extensions.iter().any(|extension| {
            extension
                .extension_name_as_c_str()
                .map(|name| name == ash::khr::swapchain::NAME)
                .unwrap_or(false)
        });
        if !has_swapchain {
            return None;
        }

        let formats = surface_loader
            .get_physical_device_surface_formats(physical_device, surface)
            .ok()?;
        let present_modes = surface_loader
            .get_physical_device_surface_present_modes(physical_device, surface)
            .ok()?;
        if formats.is_empty() || present_modes.is_empty() {
            return None;
        }

        Some(QueueFamilies { graphics, present })
    }

    unsafe fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        queue_families: QueueFamilies,
        sampler_anisotropy: bool,
    ) -> Result<ash::Device> {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<_> = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(sampler_anisotropy);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        instance
            .create_device(physical_device, &device_create_info, None)
            .map_err(|e| init_error(format!("Failed to create logical device: {:?}", e)))
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some((loader, messenger)) = self.debug_utils.take() {
                crate::debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
