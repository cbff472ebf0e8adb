use crate::wire::{GenerationRequest, ModuleId, RefineRequest};

fn intro() -> &'static str {
r#"The Affordable Modular IoT Gateway connects heterogeneous IoT sensors to cloud platforms. It is built from two modules:

- **Module A (Slave):** talks to the sensors, collects readings and prepares them for transmission (Bluetooth, Wi-Fi and similar).
- **Module B (Master):** processes the readings and forwards them to cloud platforms or endpoints (LoRaWAN, Wi-Fi and similar).

The modules talk over an **I2C bus** and exchange **JSON** documents. Module B keeps a **ring buffer** so data survives periods where forwarding is delayed."#
}

fn module_a_notes() -> &'static str {
r#"Module A (Slave) acquires and prepares data:

1. **Sensor Integration:** reads the sensor over Bluetooth, Wi-Fi or another technology.
2. **Data Formatting:** turns readings into the agreed JSON format.
3. **I2C Communication:** hands the JSON to Module B over the I2C bus.

Customisation normally happens in `createJsonData()`, which builds the JSON for the specific sensor.

**Note:** when a reading is unavailable Module A must not put incomplete or made-up values on the I2C bus."#
}

fn module_b_notes() -> &'static str {
r#"Module B (Master) receives, stores and forwards data:

1. **Data Reception:** requests JSON chunks from Module A over I2C.
2. **Validation and Storage:** validates complete documents and keeps them in the ring buffer.
3. **Data Forwarding:** sends data on to cloud platforms or endpoints over LoRaWAN, Wi-Fi or Bluetooth.

Customisation normally happens in `forwardData()`, which implements the endpoint protocol.

**Note:** Module B must not forward incomplete or non-existent values when readings are missing from the incoming data."#
}

fn data_format_notes() -> &'static str {
r#"Module A and Module B share one JSON data format. It must be readable, compact and able to nest.

### Example JSON Format:
{ "sensor_id": "string", "timestamp": "ISO-8601", "temperature": "float" }

- `sensor_id`: unique identifier of the sensor.
- `timestamp`: when the reading was taken, ISO-8601.
- `temperature`: the reading itself.

Pick a format that fits both the sensor and the endpoint.

**Note:** unavailable values are omitted rather than sent empty, so only valid data is transmitted and stored."#
}

fn module_a_sample() -> &'static str {
r#"```cpp
// Module A - Slave: collects sensor data and serves it to the master over I2C.
#include "AnttiGateway.h"
#include <ArduinoJson.h>

const uint8_t SLAVE_ADDRESS = 0x07;
AnttiGateway i2cSlave(SLAVE_ADDRESS);

void setup() {
    Serial.begin(115200);
    i2cSlave.initSlave();
    Serial.println("I2C Slave Initialized");
    delay(2000); // let the master discover the device first
}

int loopcounter = -1;

void loop() {
    loopcounter++;
    String sensorData = "{temp:" + String(loopcounter) + "}"; // must be JSON
    i2cSlave.addToRingBuffer(sensorData);
    delay(5000);
}
```"#
}

fn module_b_sample() -> &'static str {
r#"```cpp
// Module B - Master: pulls data from slaves and forwards it to an endpoint.
#include "AnttiGateway.h"
#include <ArduinoJson.h>
AnttiGateway i2cMaster;

int transmitFrequency = 2000;

void setup() {
    Serial.begin(115200);
    i2cMaster.initMaster();
    if (i2cMaster.slaveAddresses.size() < 1) {
        Serial.println("Expected number of slaves not found. Rebooting...");
        delay(2000);
        ESP.restart();
    }
    // add setup code below this line
}

void loop() {
    delay(transmitFrequency);
    uint8_t addr = i2cMaster.slaveAddresses[random(0, i2cMaster.slaveAddresses.size())];
    i2cMaster.setDeviceAddress(addr);
    while (!i2cMaster.isDataSetComplete()) {
        String receivedChunk = i2cMaster.receiveData();
        if (!AnttiGateway::ringBuffer.isEmpty()) {
            break;
        }
        delay(1000);
    }
    forwardData();
}

// Forward to a database or endpoint over LoRaWAN, Wi-Fi or similar.
void forwardData() {
    String dataFromBuffer = i2cMaster.getFromRingBuffer();
    if (!dataFromBuffer.isEmpty()) {
        StaticJsonDocument<5256> docG;
        deserializeJson(docG, dataFromBuffer);
    }
}
```"#
}

fn library_requirement() -> &'static str {
r#"Use #include "AnttiGateway.h"
Most important thing is to be compatible with the AnttiGateway.h library!"#
}

/// The two-field JSON contract every prompt ends with.
fn json_contract(code_desc: &str, explanation_desc: &str) -> String {
    format!(
r#"Provide the response strictly in the following JSON structure:
{{
  "code": "{code_desc}",
  "explanation": "{explanation_desc}"
}}
Make sure your response is in JSON format! Do not provide answer inside ```!"#
    )
}

fn examples_block(req: &GenerationRequest) -> String {
    format!(
        "- Example Code 1:  {}\n- Example Code 2:  {}",
        req.example(0),
        req.example(1)
    )
}

/// Builds the prompt for a generation request. Callers validate the request first.
pub fn build_prompt(req: &GenerationRequest) -> String {
    match req.module {
        ModuleId::ModuleA => prompt_module_a(req),
        ModuleId::ModuleB => prompt_module_b(req),
        ModuleId::DataFormat => prompt_data_format(req),
    }
}

pub fn prompt_module_a(req: &GenerationRequest) -> String {
    let i = &req.inputs;
    format!(
r#"{intro}

{notes}

{format_notes}

Code example for Module A:
{sample}

{examples}

You are designing an IoT Gateway system. Here is the setup:

Module A:
- Sensor Type: {kind}
- Description: {desc}
- Wireless Communication Technology: {tech}
- Development Board: {board}

Module B:
- Data Format for Communication between Module A and Module B: {data_format}

Please generate the Arduino code for Module A, which:
1. Connects to the specified sensor using {tech}.
2. Formats the data according to the given format.
3. Sends the data to Module B.

{library}

{contract}
"#,
        intro = intro(),
        notes = module_a_notes(),
        format_notes = data_format_notes(),
        sample = module_a_sample(),
        examples = examples_block(req),
        kind = i.kind.trim(),
        desc = i.description.trim(),
        tech = i.technology.trim(),
        board = i.board.trim(),
        data_format = req.data_format.trim(),
        library = library_requirement(),
        contract = json_contract(
            "The Arduino code for Module A as a string.",
            "A concise explanation of how the code works and interfaces with Module B as a string. Bullet points are preferred. Not JSON!",
        ),
    )
}

pub fn prompt_module_b(req: &GenerationRequest) -> String {
    let i = &req.inputs;
    format!(
r#"{intro}

{notes}

{format_notes}

Code example for Module B:
{sample}

{examples}

You are designing an IoT Gateway system. Here is the setup:

Module A:
- Data Format for Communication: {data_format}

Module B:
- Endpoint: {kind}
- Endpoint Description: {desc}
- Technology: {tech}
- Development Board: {board}

Please generate the Arduino code for Module B, which:
1. Receives data from Module A using the specified format.
2. Processes and validates the received data.
3. Transmits the data to the configured endpoint using {tech}.

{library}

{contract}
"#,
        intro = intro(),
        notes = module_b_notes(),
        format_notes = data_format_notes(),
        sample = module_b_sample(),
        examples = examples_block(req),
        data_format = req.data_format.trim(),
        kind = i.kind.trim(),
        desc = i.description.trim(),
        tech = i.technology.trim(),
        board = i.board.trim(),
        library = library_requirement(),
        contract = json_contract(
            "The Arduino code for Module B as a string.",
            "A concise explanation of how the code works and interfaces with Module A as a string. Bullet points are preferred. Not JSON!",
        ),
    )
}

/// Asks for a compact JSON format for the A to B link, given the sensor.
pub fn prompt_data_format(req: &GenerationRequest) -> String {
    let i = &req.inputs;
    format!(
r#"{intro}

{format_notes}

Code example for Module A:
{sample}

{examples}

You are designing an IoT Gateway system. Here is the setup:

Module A:
- Sensor Type: {kind}
- Description: {desc}
- Wireless Communication Technology: {tech}
- Development Board: {board}

Module B:
- Data Format for Communication between Module A and Module B: {data_format}

Please suggest a JSON format for communication between Module A and Module B. Provide an explanation of the suggested format.
Remember that for many wireless devices it is not possible to get a timestamp from them.

{contract}
"#,
        intro = intro(),
        format_notes = data_format_notes(),
        sample = module_a_sample(),
        examples = examples_block(req),
        kind = i.kind.trim(),
        desc = i.description.trim(),
        tech = i.technology.trim(),
        board = i.board.trim(),
        data_format = req.data_format.trim(),
        contract = json_contract(
            "The data format to be used between A and B modules as a string. Keep it short as there is limited data size. Short variable names are good. Only relevant variables should be transmitted. Multiline format is nice and clearer.",
            "A concise explanation of the data format and why it was suggested. Bullet points are preferred. Not JSON!",
        ),
    )
}

/// The modification request as it is echoed to the log and embedded in the prompt.
pub fn tagged_request(modification: &str) -> String {
    format!("[REQUEST] {}", modification.trim())
}

pub fn prompt_refine(req: &RefineRequest) -> String {
    format!(
r#"{request}

Original Code:
{code}

Please apply the requested modification and provide the response strictly in this JSON format:
{{
  "code": "The modified code as a string",
  "explanation": "Detailed explanation of the changes made"
}}
Make sure your response is in JSON format! Do not provide answer inside ```!
"#,
        request = tagged_request(&req.modification),
        code = req.original_code,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::ModuleInputs;

    fn request(module: ModuleId) -> GenerationRequest {
        GenerationRequest {
            module,
            inputs: ModuleInputs {
                kind: "Ruuvitag".into(),
                description: "BLE environmental tag".into(),
                technology: "Bluetooth".into(),
                board: "ESP32 Firebeetle".into(),
            },
            data_format: "{\"t\": 21.5}".into(),
            examples: vec!["// ex one".into(), "  // ex two  ".into()],
        }
    }

    #[test]
    fn module_a_prompt_carries_fields_and_contract() {
        let p = build_prompt(&request(ModuleId::ModuleA));
        assert!(p.contains("- Sensor Type: Ruuvitag"));
        assert!(p.contains("- Development Board: ESP32 Firebeetle"));
        assert!(p.contains("1. Connects to the specified sensor using Bluetooth."));
        assert!(p.contains("{\"t\": 21.5}"));
        assert!(p.contains("- Example Code 2:  // ex two\n"));
        assert!(p.contains("\"code\": \"The Arduino code for Module A as a string.\""));
        assert!(p.contains("Do not provide answer inside ```!"));
        assert!(p.contains("createJsonData()"));
    }

    #[test]
    fn module_b_prompt_uses_module_b_material() {
        let p = build_prompt(&request(ModuleId::ModuleB));
        assert!(p.contains("Code example for Module B:"));
        assert!(p.contains("forwardData()"));
        assert!(p.contains("Please generate the Arduino code for Module B"));
        assert!(!p.contains("Code example for Module A:"));
    }

    #[test]
    fn data_format_prompt_mentions_timestamps() {
        let p = build_prompt(&request(ModuleId::DataFormat));
        assert!(p.contains("Please suggest a JSON format"));
        assert!(p.contains("not possible to get a timestamp"));
        assert!(p.contains("Short variable names are good."));
    }

    #[test]
    fn refine_prompt_embeds_code_and_request() {
        let p = prompt_refine(&RefineRequest {
            target: ModuleId::ModuleA,
            original_code: "int x = 1;".into(),
            modification: " use a float ".into(),
        });
        assert!(p.starts_with("[REQUEST] use a float\n\nOriginal Code:\nint x = 1;\n"));
        assert!(p.contains("\"code\": \"The modified code as a string\""));
    }
}
