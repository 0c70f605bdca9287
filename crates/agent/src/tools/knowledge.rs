//! knowledge_query: canned knowledge article

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{ToolError, ToolOutput, ToolTrait};

pub const NAME: &str = "knowledge_query";
pub const DESCRIPTION: &str =
    "Finds the most relevant knowledge article for a user's questions about managed assets";

/// Article returned for every question until a knowledge base is wired in
pub const SLOW_DEVICES_ARTICLE: &str = "There could be several reasons why your devices are running slowly. Here are some common causes and potential solutions:

Insufficient system resources (RAM and CPU):

Close unnecessary applications and browser tabs to free up memory.
Consider upgrading your device's RAM if it's running low on memory.
Check for any resource-intensive processes or programs that may be consuming a lot of CPU power.
Hard disk drive (HDD) issues:

If your device has a traditional hard disk drive (HDD), it may be slowing down due to fragmentation or lack of free space.
Run a disk defragmentation tool to optimize the file system.
Delete unnecessary files and programs to free up disk space.
Consider upgrading to a solid-state drive (SSD) for faster read/write speeds.
Software issues:

Outdated or bloated software can consume system resources and cause slowdowns.
Update your operating system, drivers, and applications to the latest versions.
Uninstall any unnecessary programs or bloatware that may be running in the background.
Malware or virus infections:

Malware or viruses can significantly impact system performance.
Run a full system scan with a reliable anti-virus/anti-malware program to detect and remove any threats.
Overheating issues:

Overheating can cause your device to throttle its performance to prevent damage.
Clean out any dust buildup and ensure proper ventilation for your device.
Check if the cooling fans are working correctly.
Hardware aging:

If your device is several years old, the hardware components may be reaching the end of their lifespan, resulting in slower performance.
Consider upgrading to a newer device or replacing specific components, such as RAM or storage drives.
To identify the root cause, you can use system monitoring tools, check the Task Manager (Windows) or Activity Monitor (macOS) to see what processes are consuming resources, and perform basic maintenance tasks like disk cleanup and defragmentation.";

pub struct KnowledgeQueryTool;

#[async_trait]
impl ToolTrait for KnowledgeQueryTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "User provided question regarded managed assets that is used to find the most relevant knowledge article."
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let question = args.get("question").and_then(Value::as_str).unwrap_or("");
        debug!("knowledge lookup: {}", question);
        Ok(ToolOutput::text(SLOW_DEVICES_ARTICLE))
    }
}
